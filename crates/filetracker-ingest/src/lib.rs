//! The reconciliation pipeline: decode → enrich → sequence → write →
//! project, plus the move tracker, annotation store, and scheduler that
//! tie those stages into a runnable service.

pub mod annotations;
pub mod decoder;
pub mod enricher;
pub mod event_source;
pub mod move_tracker;
pub mod projector;
pub mod scheduler;
pub mod sequencer;
pub mod tag_retry;
pub mod writer;

pub use decoder::decode_object_store_event;
pub use enricher::{enrich_event, ListedObject, MockStoreClient, PermissionLogGate, S3StoreClient, StoreClient};
pub use event_source::{EventSource, InMemoryEventSource, JsonLinesEventSource};
pub use scheduler::Scheduler;
pub use sequencer::OrderingKey;
pub use tag_retry::{retry_pending_tag_writes, RetrySummary};
pub use writer::{write_batch, WriteOutcome};
