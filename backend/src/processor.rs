use std::sync::{Arc, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use shared::models::{ResultsResponse, StorageMode};
use shared::Poll;
use crate::cache::VoteCache;
use crate::store::{SharedVoteStore, StoreError, VoteSnapshot, VoteStore};

/// Owns the vote counters and keeps the cache loosely in sync with them.
///
/// The in-memory store always answers requests. The cache is fed
/// fire-and-forget increments and read back on every (re)connect.
pub struct VoteProcessor {
    poll: Poll,
    votes_key: String,
    store: SharedVoteStore,
    cache: Arc<dyn VoteCache>,
}

impl VoteProcessor {
    pub fn new(poll: Poll, votes_key: impl Into<String>, cache: Arc<dyn VoteCache>) -> Self {
        let store = SharedVoteStore::new(VoteStore::initial(&poll));
        Self {
            poll,
            votes_key: votes_key.into(),
            store,
            cache,
        }
    }

    pub fn poll(&self) -> &Poll {
        &self.poll
    }

    pub fn storage_mode(&self) -> StorageMode {
        if self.cache.is_connected() {
            StorageMode::Redis
        } else {
            StorageMode::Memory
        }
    }

    // A poisoned lock still holds a consistent store: every store mutation is a
    // single assignment, so a panic can't leave it half-updated.
    fn store(&self) -> MutexGuard<'_, VoteStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> VoteSnapshot {
        self.store().snapshot()
    }

    pub fn results(&self) -> ResultsResponse {
        self.to_results(self.snapshot())
    }

    fn to_results(&self, snapshot: VoteSnapshot) -> ResultsResponse {
        ResultsResponse {
            question: self.poll.question().to_string(),
            results: snapshot.results,
            total_votes: snapshot.total_votes,
            storage: self.storage_mode(),
        }
    }

    /// Counts a vote and returns the results that include it. The option must
    /// already be validated against the poll.
    ///
    /// Must be called from within a tokio runtime: the cache write is spawned
    /// and never awaited.
    pub fn record_vote(&self, option: &str) -> Result<ResultsResponse, StoreError> {
        let snapshot = {
            let mut store = self.store();
            store.increment(option)?;
            store.snapshot()
        };

        self.persist_vote(option);
        Ok(self.to_results(snapshot))
    }

    fn persist_vote(&self, option: &str) {
        if !self.cache.is_connected() {
            return;
        }

        let cache = Arc::clone(&self.cache);
        let key = self.votes_key.clone();
        let option = option.to_string();
        tokio::spawn(async move {
            match cache.write_field(&key, &option, 1).await {
                Ok(total) => debug!("Persisted vote for {} (cache count {})", option, total),
                Err(e) => warn!("Redis vote persist failed: {}", e),
            }
        });
    }

    /// Loads persisted counts into the store. Does nothing when the cache is
    /// disconnected; on a cache error the store is left untouched.
    pub async fn hydrate(&self) {
        if !self.cache.is_connected() {
            return;
        }

        match self.cache.read_all(&self.votes_key).await {
            Ok(persisted) if persisted.is_empty() => {
                debug!("No persisted votes under '{}'", self.votes_key);
            }
            Ok(persisted) => {
                let mut store = self.store();
                let applied = store.hydrate(&persisted);
                info!(
                    "💾 Vote store hydrated from Redis ({} options, {} votes)",
                    applied,
                    store.total()
                );
            }
            Err(e) => warn!("Could not hydrate votes from Redis: {}", e),
        }
    }

    /// Zeroes every counter, then best-effort zeroes the cached fields too.
    pub async fn reset(&self) {
        self.store().reset();

        if !self.cache.is_connected() {
            return;
        }

        let fields: Vec<(String, u64)> = self.poll.options().iter()
            .map(|option| (option.clone(), 0))
            .collect();
        if let Err(e) = self.cache.set_fields(&self.votes_key, &fields).await {
            warn!("Redis reset failed: {}", e);
        }
    }

    /// Registers the connection listener: hydrates now if the cache is already
    /// up, and again on every later transition into the connected state.
    pub fn spawn_hydration_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.cache.connection().subscribe();
        let processor = Arc::clone(self);

        tokio::spawn(async move {
            if *rx.borrow_and_update() {
                processor.hydrate().await;
            }

            while rx.changed().await.is_ok() {
                let connected = *rx.borrow_and_update();
                if connected {
                    info!("Redis connection established, hydrating vote store");
                    processor.hydrate().await;
                } else {
                    warn!("Redis connection lost, votes are kept in memory only");
                }
            }
        })
    }
}
