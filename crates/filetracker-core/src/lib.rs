//! Domain types, error taxonomy, and configuration shared by the object
//! tracker's ingestion, storage, and inventory crates.

pub mod accessibility;
pub mod config;
pub mod error;
pub mod lineage;
pub mod model;

pub use config::{ConfigError, ConfigResult, TrackerConfig};
pub use error::{TrackerError, TrackerResult};
pub use model::{ArchiveStatus, EventType, FlatEvent, FlatEventSource, IngestSummary, StorageClass};
