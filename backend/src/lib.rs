pub mod cache;
pub mod catchers;
pub mod config;
pub mod cors;
pub mod error;
pub mod processor;
pub mod routes;
pub mod store;
pub use shared::{models::*, error::*, Poll};

use rocket::{Build, Rocket, catchers, routes};
use crate::{
    catchers::{internal_error, not_found},
    cors::CORS,
    routes::{all_options, cast_vote, fail, get_poll, get_results, health, AppState},
};

/// Mounts the API, catchers and CORS onto `rocket`. Launch settings such as the
/// port stay with the caller.
pub fn build_rocket(rocket: Rocket<Build>, state: AppState, cors: CORS) -> Rocket<Build> {
    rocket
        .attach(cors)
        .manage(state)
        .mount(
            "/api",
            routes![
                health,
                get_poll,
                cast_vote,
                get_results,
                fail,
                all_options
            ],
        )
        .register(
            "/",
            catchers![
                not_found,
                internal_error
            ],
        )
}

#[cfg(test)]
mod tests;
