use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of a rejected vote. Echoes the valid options so clients can recover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvalidOptionResponse {
    pub error: String,
    pub options: Vec<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}
