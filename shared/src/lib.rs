pub mod error;
pub mod models;
pub mod validation;
pub mod poll;

pub use error::{ErrorResponse, InvalidOptionResponse};
pub use models::*;
pub use validation::*;
pub use poll::{Poll, DEFAULT_OPTIONS, DEFAULT_QUESTION};
