use std::sync::Arc;
use backend::{
    build_rocket,
    cache::{run_reconnect_task, RedisCache, VoteCache},
    config::Config,
    cors::CORS,
    processor::VoteProcessor,
    routes::AppState,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚀 Starting townhall poll server");

    let config = Config::load()?;
    let cache: Arc<dyn VoteCache> = Arc::new(RedisCache::new(
        &config.redis_url,
        config.connect_timeout,
        config.command_timeout,
    )?);
    let processor = Arc::new(VoteProcessor::new(config.poll.clone(), config.votes_key.clone(), Arc::clone(&cache)));

    // Registered before the first connect so the initial connection hydrates too.
    processor.spawn_hydration_listener();

    if !cache.connect().await {
        warn!("Starting in memory-only mode, Redis will be retried every {:?}", config.reconnect_interval);
    }
    tokio::spawn(run_reconnect_task(Arc::clone(&cache), config.reconnect_interval));

    let figment = rocket::Config::figment()
        .merge(("address", "0.0.0.0"))
        .merge(("port", config.port));

    info!("📋 Serving poll '{}' on port {}", config.poll.question(), config.port);

    build_rocket(rocket::custom(figment), AppState::new(processor), CORS::new(config.cors_origins))
        .launch()
        .await?;

    Ok(())
}
