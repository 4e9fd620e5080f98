//! Error taxonomy for the object tracker engine.
//!
//! Every failure mode named in the error handling design (malformed
//! records, transient store errors, permission errors, DB integrity
//! violations, inventory corruption, cancellation) is a variant of
//! [`TrackerError`]. Duplicate and out-of-order arrivals are *not*
//! errors — they are counters on [`crate::model::IngestSummary`].

use thiserror::Error;

/// Primary error type for ingestion, enrichment, and projection operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A record was missing a required field (`bucket` or `key`) or could
    /// not be parsed. The batch continues; only this record is dropped.
    #[error("malformed record: {message}")]
    Malformed { message: String },

    /// A store lookup (HEAD, GET tagging) failed after exhausting retries.
    /// Callers treat this the same as a clean 404: metadata stays NULL.
    #[error("transient store error for {bucket}/{key}: {message}")]
    StoreTransient {
        bucket: String,
        key: String,
        message: String,
    },

    /// Access was denied on a HEAD/tagging call.
    #[error("permission denied on {bucket}/{key}: {message}")]
    StorePermission {
        bucket: String,
        key: String,
        message: String,
    },

    /// A uniqueness or foreign-key violation surfaced during a write that
    /// should have been prevented by the dedup key. Fatal for the batch.
    #[error("database integrity violation: {0}")]
    DbIntegrity(String),

    /// An inventory data file failed its manifest MD5 check.
    #[error("inventory file {key} failed MD5 verification")]
    InventoryCorrupt { key: String },

    /// The manifest itself was missing a required field or had an
    /// unsupported container format.
    #[error("invalid inventory manifest: {0}")]
    InvalidManifest(String),

    /// The batch handler was asked to stop before it could commit.
    #[error("batch cancelled before commit")]
    Cancelled,

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl TrackerError {
    /// Whether this error should be retried by the caller rather than
    /// surfaced as a hard failure: only store-side transients are
    /// retryable here — dedup and ordering are handled upstream and
    /// never reach this type.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrackerError::StoreTransient { .. })
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
