use std::{env, fmt::Display, str::FromStr, time::Duration};
use shared::{Poll, ValidationError, DEFAULT_OPTIONS, DEFAULT_QUESTION};
use tracing::info;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_VOTES_KEY: &str = "votes";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_RECONNECT_INTERVAL_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid { key: String, value: String, reason: String },
    #[error("Invalid poll: {0}")]
    Poll(#[from] ValidationError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub votes_key: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub reconnect_interval: Duration,
    pub poll: Poll,
    /// Exact origins allowed by CORS. Empty means any `http://localhost` origin.
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup, so parsing can be tested without
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let question = lookup("POLL_QUESTION").unwrap_or_else(|| DEFAULT_QUESTION.to_string());
        let options = match lookup("POLL_OPTIONS") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_OPTIONS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(Self {
            port: try_load(&lookup, "PORT", DEFAULT_PORT)?,
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| {
                info!("REDIS_URL not set, using default: {DEFAULT_REDIS_URL}");
                DEFAULT_REDIS_URL.to_string()
            }),
            votes_key: lookup("VOTES_KEY").unwrap_or_else(|| DEFAULT_VOTES_KEY.to_string()),
            connect_timeout: Duration::from_millis(
                try_load(&lookup, "REDIS_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)?,
            ),
            command_timeout: Duration::from_millis(
                try_load(&lookup, "REDIS_COMMAND_TIMEOUT_MS", DEFAULT_COMMAND_TIMEOUT_MS)?.max(1),
            ),
            reconnect_interval: Duration::from_secs(
                try_load(&lookup, "REDIS_RECONNECT_INTERVAL_SECS", DEFAULT_RECONNECT_INTERVAL_SECS)?
                    .max(1),
            ),
            poll: Poll::new(question, options)?,
            cors_origins: lookup("CORS_ORIGINS").map(|raw| split_list(&raw)).unwrap_or_default(),
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                value,
                reason: e.to_string(),
            })
        }
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
