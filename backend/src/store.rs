use std::collections::HashMap;
use std::sync::Mutex;
use shared::models::OptionResult;
use shared::Poll;

/// The store is not synchronized on its own; every access goes through this lock.
pub type SharedVoteStore = Mutex<VoteStore>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown option: {0}")]
    UnknownOption(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteSnapshot {
    pub results: Vec<OptionResult>,
    pub total_votes: u64,
}

/// In-memory vote counters, one per poll option. This is what every response
/// is built from, whether or not the cache is reachable.
#[derive(Debug, Clone)]
pub struct VoteStore {
    options: Vec<String>,
    counts: Vec<u64>,
}

impl VoteStore {
    pub fn initial(poll: &Poll) -> Self {
        let options = poll.options().to_vec();
        let counts = vec![0; options.len()];
        Self { options, counts }
    }

    pub fn increment(&mut self, option: &str) -> Result<u64, StoreError> {
        let idx = self.index_of(option)?;
        self.counts[idx] = self.counts[idx].saturating_add(1);
        Ok(self.counts[idx])
    }

    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    pub fn count(&self, option: &str) -> Option<u64> {
        self.index_of(option).ok().map(|idx| self.counts[idx])
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().fold(0, |total, &c| total.saturating_add(c))
    }

    pub fn snapshot(&self) -> VoteSnapshot {
        let results = self.options.iter()
            .zip(&self.counts)
            .map(|(option, &votes)| OptionResult { option: option.clone(), votes })
            .collect();

        VoteSnapshot { results, total_votes: self.total() }
    }

    /// Overwrites counts with persisted values. Options missing from `persisted`
    /// keep their current count. Each value is read from its leading digits, so
    /// `"12abc"` is 12 and `"abc"` or `"-4"` is 0.
    /// Returns how many options were overwritten.
    pub fn hydrate(&mut self, persisted: &HashMap<String, String>) -> usize {
        let mut applied = 0;
        for (option, count) in self.options.iter().zip(self.counts.iter_mut()) {
            if let Some(raw) = persisted.get(option) {
                *count = parse_count(raw);
                applied += 1;
            }
        }
        applied
    }

    fn index_of(&self, option: &str) -> Result<usize, StoreError> {
        self.options.iter()
            .position(|o| o == option)
            .ok_or_else(|| StoreError::UnknownOption(option.to_string()))
    }
}

fn parse_count(raw: &str) -> u64 {
    let trimmed = raw.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());

    match &unsigned[..end] {
        "" => 0,
        digits => digits.parse().unwrap_or(u64::MAX),
    }
}
