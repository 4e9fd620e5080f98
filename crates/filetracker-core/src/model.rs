//! Domain types shared across the ingestion pipeline.
//!
//! [`FlatEvent`] is the normalized record produced by the Event Decoder
//! and consumed by every downstream stage. It carries every field
//! of `StoreEvent` plus enrichment hints that the Metadata Enricher
//! may already have (e.g. a crawl record already knows storage class).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Event-type taxonomy. Distinguishes object deletion from delete-marker
/// creation, which a naive string match on the source's `detail-type`
/// would collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Created,
    Deleted,
    DeletedLifecycle,
    Restored,
    RestoreExpired,
    StorageClassChanged,
    Crawl,
    CrawlRestored,
    TaggingCreated,
    TaggingDeleted,
}

impl EventType {
    /// Whether a surviving event of this type can make its version current.
    pub fn is_creative(self) -> bool {
        matches!(
            self,
            EventType::Created | EventType::Crawl | EventType::CrawlRestored
        )
    }

    /// Terminal for the version_id state machine: no further event
    /// can resurrect this version once one of these has landed.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventType::DeletedLifecycle)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Created => "Created",
            EventType::Deleted => "Deleted",
            EventType::DeletedLifecycle => "DeletedLifecycle",
            EventType::Restored => "Restored",
            EventType::RestoreExpired => "RestoreExpired",
            EventType::StorageClassChanged => "StorageClassChanged",
            EventType::Crawl => "Crawl",
            EventType::CrawlRestored => "CrawlRestored",
            EventType::TaggingCreated => "TaggingCreated",
            EventType::TaggingDeleted => "TaggingDeleted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Created" => Some(EventType::Created),
            "Deleted" => Some(EventType::Deleted),
            "DeletedLifecycle" => Some(EventType::DeletedLifecycle),
            "Restored" => Some(EventType::Restored),
            "RestoreExpired" => Some(EventType::RestoreExpired),
            "StorageClassChanged" => Some(EventType::StorageClassChanged),
            "Crawl" => Some(EventType::Crawl),
            "CrawlRestored" => Some(EventType::CrawlRestored),
            "TaggingCreated" => Some(EventType::TaggingCreated),
            "TaggingDeleted" => Some(EventType::TaggingDeleted),
            _ => None,
        }
    }
}

/// Which of the three input streams produced a [`FlatEvent`]. Decoding is
/// source-specific; everything after the decoder is source-blind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlatEventSource {
    ObjectStore,
    Inventory,
    Crawl,
}

/// Storage class enum. `None` means "unknown", which is treated as
/// accessible per the `is_accessible` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageClass {
    Standard,
    StandardIa,
    OnezoneIa,
    IntelligentTiering,
    Glacier,
    GlacierIr,
    DeepArchive,
    Outposts,
    ReducedRedundancy,
    Snow,
}

impl StorageClass {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "STANDARD" => Some(Self::Standard),
            "STANDARD_IA" => Some(Self::StandardIa),
            "ONEZONE_IA" => Some(Self::OnezoneIa),
            "INTELLIGENT_TIERING" => Some(Self::IntelligentTiering),
            "GLACIER" => Some(Self::Glacier),
            "GLACIER_IR" => Some(Self::GlacierIr),
            "DEEP_ARCHIVE" => Some(Self::DeepArchive),
            "OUTPOSTS" => Some(Self::Outposts),
            "REDUCED_REDUNDANCY" => Some(Self::ReducedRedundancy),
            "SNOW" => Some(Self::Snow),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::StandardIa => "STANDARD_IA",
            Self::OnezoneIa => "ONEZONE_IA",
            Self::IntelligentTiering => "INTELLIGENT_TIERING",
            Self::Glacier => "GLACIER",
            Self::GlacierIr => "GLACIER_IR",
            Self::DeepArchive => "DEEP_ARCHIVE",
            Self::Outposts => "OUTPOSTS",
            Self::ReducedRedundancy => "REDUCED_REDUNDANCY",
            Self::Snow => "SNOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveStatus {
    ArchiveAccess,
    DeepArchiveAccess,
}

/// The normalized internal record produced by the Event Decoder.
///
/// `sequencer: None` sorts last within `(bucket, key, version_id)`: it is
/// treated as the latest-known state, which is why inventory and crawl
/// records (which never carry a real sequencer) still participate
/// correctly in ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatEvent {
    pub source: FlatEventSource,
    pub event_type: EventType,
    pub event_time: DateTime<Utc>,
    pub sequencer: Option<String>,
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
    pub size: Option<i64>,
    pub e_tag: Option<String>,
    /// The store-reported reason string, preserved verbatim
    /// (`detail.reason`). Used by the `is_accessible` rule to tell a
    /// `Restored`/`CrawlRestored` event apart from other reasons.
    pub reason: Option<String>,
    /// `Deleted` is overloaded in the event-type enum: this flag is
    /// what actually distinguishes a versioned-bucket delete-marker
    /// creation from a permanent removal of a specific version, since
    /// both decode to `EventType::Deleted`.
    pub is_delete_marker: bool,
    /// Enrichment hints the source already supplied (inventory rows and
    /// crawl listings carry storage class inline; object-store events
    /// from the low-latency stream usually do not).
    pub storage_class: Option<StorageClass>,
    pub archive_status: Option<ArchiveStatus>,
    pub existing_lineage_tag: Option<Uuid>,
    pub tags: HashMap<String, String>,
}

impl FlatEvent {
    pub fn key_tuple(&self) -> (String, String, Option<String>) {
        (self.bucket.clone(), self.key.clone(), self.version_id.clone())
    }

    pub fn bucket_key(&self) -> (String, String) {
        (self.bucket.clone(), self.key.clone())
    }

    /// Key used to recognize a repeated delivery of the same event.
    pub fn dedup_key(&self) -> (String, String, Option<String>, Option<String>, EventType) {
        (
            self.bucket.clone(),
            self.key.clone(),
            self.version_id.clone(),
            self.sequencer.clone(),
            self.event_type,
        )
    }
}

/// Per-batch outcome returned from every ingest entrypoint. Makes the
/// "batch either fully commits or is not acked" contract concrete:
/// this struct only exists once a transaction has committed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub accepted: u64,
    pub malformed: u64,
    pub duplicates: u64,
    pub reordered: u64,
    pub enriched: u64,
    pub enrichment_failures: u64,
}

impl IngestSummary {
    pub fn merge(&mut self, other: &IngestSummary) {
        self.accepted += other.accepted;
        self.malformed += other.malformed;
        self.duplicates += other.duplicates;
        self.reordered += other.reordered;
        self.enriched += other.enriched;
        self.enrichment_failures += other.enrichment_failures;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_class_round_trips_through_its_wire_string() {
        for class in [
            StorageClass::Standard,
            StorageClass::DeepArchive,
            StorageClass::IntelligentTiering,
            StorageClass::Snow,
        ] {
            assert_eq!(StorageClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(StorageClass::parse("NOT_A_CLASS"), None);
    }

    #[test]
    fn event_type_round_trips_through_its_wire_string() {
        for event_type in [EventType::Created, EventType::DeletedLifecycle, EventType::CrawlRestored] {
            assert_eq!(EventType::parse(event_type.as_str()), Some(event_type));
        }
        assert_eq!(EventType::parse("NotAnEventType"), None);
    }

    #[test]
    fn only_lifecycle_delete_is_terminal() {
        assert!(EventType::DeletedLifecycle.is_terminal());
        assert!(!EventType::Deleted.is_terminal());
    }

    #[test]
    fn summary_merge_accumulates_each_counter() {
        let mut total = IngestSummary { accepted: 3, ..Default::default() };
        total.merge(&IngestSummary { accepted: 2, duplicates: 1, ..Default::default() });
        assert_eq!(total.accepted, 5);
        assert_eq!(total.duplicates, 1);
    }
}
