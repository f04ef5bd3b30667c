//! Redis-backed mirror of the vote counters.
//!
//! The cache is strictly best-effort. Connectivity is tracked in a
//! [`ConnectionState`] that flips on connect and on transport errors; while it
//! reads disconnected every operation fails fast with
//! [`CacheError::Disconnected`] instead of queueing or retrying.
//!
//! Wire layout: one hash (`votes` by default) with one field per poll option
//! holding a decimal count.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, RedisError, RedisResult,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache is not connected")]
    Disconnected,
    #[error("Cache did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Last known connectivity, published to anyone who subscribes.
#[derive(Debug)]
pub struct ConnectionState {
    tx: watch::Sender<bool>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records a new state. Returns true only on an actual transition, and only
    /// transitions wake subscribers.
    pub fn set(&self, connected: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[async_trait]
pub trait VoteCache: Send + Sync {
    fn connection(&self) -> &ConnectionState;

    fn is_connected(&self) -> bool {
        self.connection().is_connected()
    }

    /// One bounded connection attempt. Returns whether the cache is now usable.
    async fn connect(&self) -> bool;

    /// Liveness check on an established connection. A failure marks the cache
    /// disconnected.
    async fn ping(&self) -> CacheResult<()>;

    /// All fields of `key`; empty if the key doesn't exist.
    async fn read_all(&self, key: &str) -> CacheResult<HashMap<String, String>>;

    /// Atomically adds `delta` to `field`, returning the new value.
    async fn write_field(&self, key: &str, field: &str, delta: i64) -> CacheResult<i64>;

    async fn set_fields(&self, key: &str, fields: &[(String, u64)]) -> CacheResult<()>;
}

pub struct RedisCache {
    client: Client,
    connect_timeout: Duration,
    command_timeout: Duration,
    manager: Mutex<Option<ConnectionManager>>,
    state: ConnectionState,
}

impl RedisCache {
    /// Parses the URL only; no connection is made until [`VoteCache::connect`].
    /// Every command gets `command_timeout` to answer before the cache is
    /// treated as gone.
    pub fn new(redis_url: &str, connect_timeout: Duration, command_timeout: Duration) -> CacheResult<Self> {
        Ok(Self {
            client: Client::open(redis_url)?,
            connect_timeout,
            command_timeout,
            manager: Mutex::new(None),
            state: ConnectionState::default(),
        })
    }

    fn manager(&self) -> CacheResult<ConnectionManager> {
        if !self.state.is_connected() {
            return Err(CacheError::Disconnected);
        }
        self.manager
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CacheError::Disconnected)
    }

    // Drops the connection so the next connect starts from a fresh socket.
    fn mark_disconnected(&self, reason: &dyn std::fmt::Display) {
        self.manager.lock().unwrap_or_else(PoisonError::into_inner).take();
        if self.state.set(false) {
            warn!("Redis unavailable, using in-memory fallback: {}", reason);
        }
    }

    async fn run<T, F>(&self, command: F) -> CacheResult<T>
    where
        F: Future<Output = RedisResult<T>> + Send,
    {
        match timeout(self.command_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if is_transport_error(&e) {
                    self.mark_disconnected(&e);
                }
                Err(CacheError::from(e))
            }
            Err(_) => {
                let err = CacheError::Timeout(self.command_timeout);
                self.mark_disconnected(&err);
                Err(err)
            }
        }
    }

    async fn try_connect(&self) -> CacheResult<ConnectionManager> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_response_timeout(self.command_timeout)
            .set_connection_timeout(self.connect_timeout);
        let attempt = self.client.get_connection_manager_with_config(config);
        match timeout(self.connect_timeout, attempt).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout(self.connect_timeout)),
        }
    }
}

#[async_trait]
impl VoteCache for RedisCache {
    fn connection(&self) -> &ConnectionState {
        &self.state
    }

    async fn connect(&self) -> bool {
        match self.try_connect().await {
            Ok(manager) => {
                *self.manager.lock().unwrap_or_else(PoisonError::into_inner) = Some(manager);
                if self.state.set(true) {
                    info!("🔌 Redis connected");
                }
                true
            }
            Err(e) => {
                self.state.set(false);
                warn!("Redis unavailable, using in-memory fallback: {}", e);
                false
            }
        }
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.manager()?;
        let ping = redis::cmd("PING");
        let _pong: String = self.run(ping.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn read_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.manager()?;
        self.run(conn.hgetall(key)).await
    }

    async fn write_field(&self, key: &str, field: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.manager()?;
        self.run(conn.hincr(key, field, delta)).await
    }

    async fn set_fields(&self, key: &str, fields: &[(String, u64)]) -> CacheResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager()?;
        self.run(conn.hset_multiple(key, fields)).await
    }
}

fn is_transport_error(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
}

/// Watches the connection every `every`: pings while connected so an idle
/// outage is noticed, and retries the connection while disconnected. Both
/// transitions are announced through the cache's [`ConnectionState`].
pub async fn run_reconnect_task(cache: Arc<dyn VoteCache>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("🔁 Redis reconnect supervisor started");

    loop {
        ticker.tick().await;
        if cache.is_connected() {
            if let Err(e) = cache.ping().await {
                debug!("Redis ping failed: {}", e);
            }
        } else {
            debug!("Attempting Redis reconnect");
            cache.connect().await;
        }
    }
}
