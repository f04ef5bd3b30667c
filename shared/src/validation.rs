use std::collections::HashSet;
use crate::poll::Poll;

pub const MAX_QUESTION_LENGTH: usize = 200;
pub const MAX_OPTION_LENGTH: usize = 40;
pub const MAX_OPTIONS: usize = 20;
pub const MIN_OPTIONS: usize = 1;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Question must not be empty")]
    EmptyQuestion,
    #[error("Question exceeds maximum length of {MAX_QUESTION_LENGTH}")]
    QuestionTooLong,
    #[error("Option text exceeds maximum length of {MAX_OPTION_LENGTH}")]
    OptionTooLong,
    #[error("Too many options (maximum {MAX_OPTIONS})")]
    TooManyOptions,
    #[error("Too few options (minimum {MIN_OPTIONS})")]
    TooFewOptions,
    #[error("Duplicate option: {0}")]
    DuplicateOption(String),
    #[error("Empty option text")]
    EmptyOption,
    #[error("Invalid option")]
    InvalidOption,
}

pub fn validate_poll(question: &str, options: &[String]) -> Result<(), ValidationError> {
    if question.trim().is_empty() { return Err(ValidationError::EmptyQuestion); }
    if question.len() > MAX_QUESTION_LENGTH { return Err(ValidationError::QuestionTooLong); }
    if options.len() > MAX_OPTIONS { return Err(ValidationError::TooManyOptions); }
    if options.len() < MIN_OPTIONS { return Err(ValidationError::TooFewOptions); }
    if options.iter().any(|opt| opt.trim().is_empty()) { return Err(ValidationError::EmptyOption); }
    if options.iter().any(|opt| opt.len() > MAX_OPTION_LENGTH) { return Err(ValidationError::OptionTooLong); }

    let mut seen = HashSet::new();
    if let Some(dup) = options.iter().find(|opt| !seen.insert(opt.as_str())) {
        return Err(ValidationError::DuplicateOption(dup.clone()));
    }

    Ok(())
}

/// Checks a submitted option against the poll. Matching is exact, so
/// `"design"` is not a vote for `"Design"`.
pub fn validate_option<'a>(poll: &Poll, option: Option<&'a str>) -> Result<&'a str, ValidationError> {
    match option {
        Some(opt) if poll.contains(opt) => Ok(opt),
        _ => Err(ValidationError::InvalidOption),
    }
}
