//! Diesel/Postgres persistence layer: schema, row models, connection
//! pool, startup migrations, and the transaction-scoped repository the
//! ingestion pipeline writes through.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod repository;
pub mod schema;

pub use pool::{get_connection, init_pool, DbConnection, DbPool};
pub use repository::{NewStoreEvent, Repository};
