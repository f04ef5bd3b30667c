use serde::Serialize;
use crate::validation::{validate_poll, ValidationError};

pub const DEFAULT_QUESTION: &str = "Which team should host the next townhall?";
pub const DEFAULT_OPTIONS: [&str; 3] = ["Engineering", "Product", "Design"];

/// The single poll served by an instance. Options keep their configured order,
/// which is also the order results are reported in.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Poll {
    question: String,
    options: Vec<String>,
}

impl Poll {
    pub fn new(question: impl Into<String>, options: Vec<String>) -> Result<Self, ValidationError> {
        let question = question.into();
        validate_poll(&question, &options)?;
        Ok(Self { question, options })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn contains(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

impl Default for Poll {
    fn default() -> Self {
        Self {
            question: DEFAULT_QUESTION.to_string(),
            options: DEFAULT_OPTIONS.iter().map(|o| o.to_string()).collect(),
        }
    }
}
