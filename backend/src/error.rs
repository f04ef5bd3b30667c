use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use shared::{ErrorResponse, InvalidOptionResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid option")]
    InvalidOption { options: Vec<String> },
    #[error("Forced failure for alert testing")]
    ForcedFailure,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::InvalidOption { .. } => Status::BadRequest,
            ApiError::ForcedFailure => Status::InternalServerError,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let message = self.to_string();

        let body = match self {
            ApiError::InvalidOption { options } => {
                Json(InvalidOptionResponse { error: message, options }).respond_to(req)?
            }
            _ => Json(ErrorResponse::new(message)).respond_to(req)?,
        };

        rocket::Response::build_from(body)
            .status(status)
            .ok()
    }
}
