//! Bounded connection pool: a `Builder` configured from a typed config
//! struct rather than a raw connection string plus magic numbers.

use diesel::pg::PgConnection;
use diesel::r2d2::{Builder, ConnectionManager, Pool, PooledConnection};

use filetracker_core::config::DbConfig;
use filetracker_core::error::{TrackerError, TrackerResult};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub fn init_pool(config: &DbConfig) -> TrackerResult<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(config.database_url());

    Builder::new()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(config.connection_timeout())
        .test_on_check_out(true)
        .build(manager)
        .map_err(|e| TrackerError::DbIntegrity(format!("failed to build connection pool: {e}")))
}

pub fn get_connection(pool: &DbPool) -> TrackerResult<DbConnection> {
    pool.get().map_err(TrackerError::from)
}
