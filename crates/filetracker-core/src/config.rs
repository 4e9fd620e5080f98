//! Environment-driven configuration: one struct per concern, each with
//! its own `from_env`, composed into a top-level config that validates
//! all of its parts.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> ConfigResult<T> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value }),
        Err(_) => Ok(default),
    }
}

/// Object store endpoint, lineage tag key, and enrichment request budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Optional override for the S3-compatible endpoint (tests / non-AWS
    /// stores). `None` uses the AWS SDK's default resolution chain.
    pub store_event_source_endpoint: Option<String>,
    pub tag_key_name: String,
    pub max_enrichment_attempts: u32,
    pub enrichment_timeout_ms: u64,
    /// Maximum number of concurrent in-flight HEAD/tagging calls.
    pub enrichment_request_budget: usize,
}

impl StoreConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            store_event_source_endpoint: env::var("STORE_EVENT_SOURCE_ENDPOINT").ok(),
            tag_key_name: env_or("TAG_KEY_NAME", "umccr-org:OrcaBusFileManagerIngestId"),
            max_enrichment_attempts: parse_env("MAX_ENRICHMENT_ATTEMPTS", 5)?,
            enrichment_timeout_ms: parse_env("ENRICHMENT_TIMEOUT_MS", 3_000)?,
            enrichment_request_budget: parse_env("ENRICHMENT_REQUEST_BUDGET", 32usize)?,
        })
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.tag_key_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("tag_key_name must not be empty".into()));
        }
        if self.enrichment_request_budget == 0 {
            return Err(ConfigError::ValidationFailed(
                "enrichment_request_budget must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub db_endpoint: String,
    pub db_user: String,
    pub db_password: Option<String>,
    pub db_name: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_ms: u64,
}

impl DbConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            db_endpoint: env::var("DB_ENDPOINT")
                .map_err(|_| ConfigError::EnvVarNotFound("DB_ENDPOINT".into()))?,
            db_user: env::var("DB_USER").map_err(|_| ConfigError::EnvVarNotFound("DB_USER".into()))?,
            db_password: env::var("DB_PASSWORD").ok(),
            db_name: env_or("DB_NAME", "filetracker"),
            max_connections: parse_env("DB_MAX_CONNECTIONS", 20)?,
            min_connections: parse_env("DB_MIN_CONNECTIONS", 2)?,
            connection_timeout_ms: parse_env("DB_CONNECTION_TIMEOUT_MS", 30_000)?,
        })
    }

    /// Postgres connection string, built from the discrete fields above.
    pub fn database_url(&self) -> String {
        match &self.db_password {
            Some(password) => format!(
                "postgres://{}:{}@{}/{}",
                self.db_user, password, self.db_endpoint, self.db_name
            ),
            None => format!("postgres://{}@{}/{}", self.db_user, self.db_endpoint, self.db_name),
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.min_connections > self.max_connections {
            return Err(ConfigError::ValidationFailed(
                "min_connections must not exceed max_connections".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub log_level: String,
    /// Number of worker-per-key-hash shards.
    pub partition_count: usize,
    /// Rows drained per run of the tag-retry reconciliation sweep.
    pub tag_retry_batch_size: i64,
}

impl IngestConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            batch_size: parse_env("BATCH_SIZE", 500usize)?,
            log_level: env_or("LOG_LEVEL", "info"),
            partition_count: parse_env("PARTITION_COUNT", 16usize)?,
            tag_retry_batch_size: parse_env("TAG_RETRY_BATCH_SIZE", 200i64)?,
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::ValidationFailed("batch_size must be at least 1".into()));
        }
        if self.partition_count == 0 {
            return Err(ConfigError::ValidationFailed("partition_count must be at least 1".into()));
        }
        if self.tag_retry_batch_size <= 0 {
            return Err(ConfigError::ValidationFailed("tag_retry_batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub store: StoreConfig,
    pub db: DbConfig,
    pub ingest: IngestConfig,
}

impl TrackerConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            store: StoreConfig::from_env()?,
            db: DbConfig::from_env()?,
            ingest: IngestConfig::from_env()?,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.store.validate()?;
        self.db.validate()?;
        self.ingest.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize these tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn store_config_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in ["TAG_KEY_NAME", "MAX_ENRICHMENT_ATTEMPTS", "ENRICHMENT_REQUEST_BUDGET"] {
            env::remove_var(key);
        }
        let cfg = StoreConfig::from_env().unwrap();
        assert_eq!(cfg.tag_key_name, "umccr-org:OrcaBusFileManagerIngestId");
        assert_eq!(cfg.max_enrichment_attempts, 5);
        cfg.validate().unwrap();
    }

    #[test]
    fn db_config_rejects_inverted_pool_bounds() {
        let cfg = DbConfig {
            db_endpoint: "localhost".into(),
            db_user: "tracker".into(),
            db_password: None,
            db_name: "filetracker".into(),
            max_connections: 2,
            min_connections: 5,
            connection_timeout_ms: 1000,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn db_config_builds_url_without_password() {
        let cfg = DbConfig {
            db_endpoint: "db.internal:5432".into(),
            db_user: "tracker".into(),
            db_password: None,
            db_name: "filetracker".into(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_ms: 1000,
        };
        assert_eq!(cfg.database_url(), "postgres://tracker@db.internal:5432/filetracker");
    }
}
