//! Move Tracker: assigns and propagates the stable `lineage_id`
//! that lets a copy or rename be recognized as the same logical object.
//!
//! Tag writes happen after the enclosing DB transaction commits and are
//! independently retryable, so this module only returns *what* to write;
//! the caller decides when.

use std::collections::HashMap;

use uuid::Uuid;

use filetracker_core::lineage;

/// Resolve the `lineage_id` for a newly-seen `(bucket, key, version_id)`.
///
/// Returns the id to persist on the `Object` row and whether a tag
/// write-back is needed: adopt an existing tag without rewriting it,
/// mint a fresh one only when none was found.
pub fn resolve_lineage(existing_tag: Option<Uuid>) -> (Uuid, bool) {
    match existing_tag {
        Some(id) => (id, false),
        None => (Uuid::new_v4(), true),
    }
}

/// A tag write that still needs to happen against the object store. The
/// engine never blocks ingestion on this — a failed write becomes a
/// `PendingTagWrite` for a later reconciliation pass to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTagWrite {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
    pub lineage_id: Uuid,
    pub existing_tags: HashMap<String, String>,
}

/// Build the tag set to write back: the lineage tag merged into whatever
/// tags enrichment already observed on the object, never overwriting
/// other tag keys (the object store tag API replaces the whole set).
pub fn lineage_tag_set(existing_tags: &HashMap<String, String>, tag_key_name: &str, lineage_id: Uuid) -> HashMap<String, String> {
    let mut tags = existing_tags.clone();
    tags.insert(tag_key_name.to_string(), lineage::format_tag_value(lineage_id));
    tags
}
