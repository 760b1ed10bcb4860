use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arena_population_server::config::ServerConfig;
use arena_population_server::db::Database;
use arena_population_server::game::scheduler::start_scheduler;
use arena_population_server::game::systems::lifecycle::init_world;
use arena_population_server::metrics::{self, Metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging (RUST_LOG overrides the default level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Arena Population Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid configuration: {}", e);
    }
    info!(
        "Configuration loaded: world_size={}, target_food={}, spawn every {}ms",
        config.world_size, config.target_food_count, config.spawn_interval_ms
    );

    let metrics = Arc::new(Metrics::new());
    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    // World creation: config singleton plus the recurring spawn job, atomically
    let db = Arc::new(Database::new());
    let settings = config.world_settings();
    let job = init_world(&db, &settings)
        .map_err(|e| anyhow::anyhow!("World initialization failed: {}", e))?;
    db.read(|t| metrics.observe_world(t));
    info!("Spawn job {} registered", job.scheduled_id);

    let scheduler = start_scheduler(db.clone(), settings.rules, metrics.clone());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    scheduler.abort();
    let (food, players) = db.read(|t| (t.food.count(), t.player.count()));
    info!("Server stopped ({} food, {} players)", food, players);

    Ok(())
}
