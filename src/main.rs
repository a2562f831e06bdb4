use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use tripcraft::api::AppState;
use tripcraft::cache::{MemoryCache, PersistentCache, PlaceCache, TtlPolicy};
use tripcraft::{ItineraryConfig, ItineraryPlanner, logging, web};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ItineraryConfig::load_from_path(config_path).context("Failed to load configuration")?;
    logging::init(&config.logging)?;

    let policy = TtlPolicy::from(&config.cache);
    let cache: Arc<dyn PlaceCache> = match config.cache.resolved_location() {
        Some(path) => {
            info!(path = %path.display(), "opening place cache");
            Arc::new(PersistentCache::open(&path, policy)?)
        }
        None => {
            info!("using in-memory place cache");
            Arc::new(MemoryCache::new(policy))
        }
    };

    let planner = ItineraryPlanner::from_config(&config, cache).context("Failed to build planner")?;
    info!(version = tripcraft::VERSION, port = config.server.port, "starting tripcraft");
    web::run(config.server.port, AppState::new(planner)).await
}
