use std::sync::Arc;
use rocket::{State, get, post, http::Status, serde::json::{self, Json}};
use time::OffsetDateTime;
use tracing::{debug, error, instrument};
use shared::models::*;
use shared::validation::validate_option;
use crate::{error::ApiError, processor::VoteProcessor};

pub const SERVICE_NAME: &str = "backend";

pub struct AppState {
    pub processor: Arc<VoteProcessor>,
}

impl AppState {
    pub fn new(processor: Arc<VoteProcessor>) -> Self {
        Self { processor }
    }

    fn invalid_option(&self) -> ApiError {
        ApiError::InvalidOption {
            options: self.processor.poll().options().to_vec(),
        }
    }
}

#[get("/health")]
pub async fn health(state: &State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        service: SERVICE_NAME.into(),
        storage: state.processor.storage_mode(),
        timestamp: OffsetDateTime::now_utc(),
    })
}

#[get("/poll")]
pub async fn get_poll(state: &State<AppState>) -> Json<PollResponse> {
    let poll = state.processor.poll();
    Json(PollResponse {
        question: poll.question().to_string(),
        options: poll.options().to_vec(),
    })
}

#[instrument(skip(state, request))]
#[post("/vote", data = "<request>")]
pub async fn cast_vote(
    state: &State<AppState>,
    request: Result<Json<VoteRequest>, json::Error<'_>>,
) -> Result<Json<VoteResponse>, ApiError> {
    let request = request.map_err(|e| {
        debug!("Rejecting unreadable vote body: {}", e);
        state.invalid_option()
    })?;

    let option = validate_option(state.processor.poll(), request.option.as_deref())
        .map_err(|_| state.invalid_option())?;

    let results = state.processor.record_vote(option).map_err(|e| {
        error!("Validated option rejected by store: {}", e);
        ApiError::Internal(e.to_string())
    })?;

    Ok(Json(VoteResponse {
        message: "Vote accepted".into(),
        selected_option: option.to_string(),
        results,
    }))
}

#[get("/results")]
pub async fn get_results(state: &State<AppState>) -> Json<ResultsResponse> {
    Json(state.processor.results())
}

#[get("/fail")]
pub async fn fail() -> ApiError {
    ApiError::ForcedFailure
}

#[rocket::options("/<_..>")]
pub async fn all_options() -> Status {
    Status::Ok
}
