//! Stand-alone migration runner, for deploy pipelines that run schema
//! migrations as a separate step from the long-running batch handlers.

use filetracker_core::config::{DbConfig, TrackerConfig};
use filetracker_core::error::TrackerResult;
use filetracker_db::{get_connection, init_pool, migrations};

fn main() -> TrackerResult<()> {
    dotenvy::dotenv().ok();
    filetracker_app::logging::init_structured_logging();

    let db: DbConfig = TrackerConfig::from_env()?.db;
    let pool = init_pool(&db)?;
    let mut conn = get_connection(&pool)?;
    migrations::run_pending(&mut conn)?;

    tracing::info!("migrations applied");
    Ok(())
}
