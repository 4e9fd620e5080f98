//! Startup migration runner: SQL files under `migrations/`, embedded at
//! compile time and run once at process startup.

use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use filetracker_core::error::{TrackerError, TrackerResult};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn run_pending(conn: &mut PgConnection) -> TrackerResult<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| TrackerError::DbIntegrity(format!("migration failed: {e}")))
}
