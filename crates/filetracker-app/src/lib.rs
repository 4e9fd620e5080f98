//! Process wiring shared by the batch-handler binaries: config load,
//! pool init, startup migrations, and scheduler construction.

pub mod logging;

use std::sync::Arc;

use filetracker_core::config::TrackerConfig;
use filetracker_core::error::TrackerResult;
use filetracker_db::{get_connection, init_pool, migrations, DbPool};
use filetracker_ingest::{S3StoreClient, Scheduler, StoreClient};

pub struct Runtime {
    pub config: TrackerConfig,
    pub pool: DbPool,
}

/// Load config, init the DB pool, and run pending migrations. Every
/// binary entrypoint calls this first.
pub async fn bootstrap() -> TrackerResult<Runtime> {
    if std::env::var("RUST_BACKTRACE").is_err() {
        std::env::set_var("RUST_BACKTRACE", "1");
    }
    dotenvy::dotenv().ok();
    logging::init_structured_logging();

    let config = TrackerConfig::from_env()?;
    config.validate()?;

    let pool = init_pool(&config.db)?;
    let mut conn = get_connection(&pool)?;
    migrations::run_pending(&mut conn)?;

    Ok(Runtime { config, pool })
}

pub async fn build_store_client() -> Arc<dyn StoreClient> {
    Arc::new(S3StoreClient::from_env().await)
}

/// Spawn the worker-per-key-hash scheduler sized from `IngestConfig`.
pub fn spawn_scheduler(
    runtime: &Runtime,
    store_client: Arc<dyn StoreClient>,
) -> (Scheduler, Vec<filetracker_ingest::scheduler::ScheduledShard>) {
    Scheduler::spawn(
        runtime.config.ingest.partition_count,
        runtime.config.ingest.batch_size * 4,
        runtime.config.ingest.batch_size,
        runtime.pool.clone(),
        store_client,
        runtime.config.store.tag_key_name.clone(),
    )
}
