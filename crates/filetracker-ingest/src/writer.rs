//! Ingest Writer: the per-batch orchestration that ties the Sequencer,
//! Move Tracker, and State Projector together inside one DB transaction
//! per `(bucket, key)` group.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use filetracker_core::error::TrackerResult;
use filetracker_core::model::{ArchiveStatus, EventType, FlatEvent, IngestSummary, StorageClass};
use filetracker_db::models::{Object, S3Metadata};
use filetracker_db::{NewStoreEvent, Repository};

use crate::move_tracker::{self, PendingTagWrite};
use crate::projector::{pick_current_version, project_key, ProjectedEvent};
use crate::sequencer::{arrived_out_of_order, OrderingKey};

type VersionKey = (String, String, Option<String>);

#[derive(Default, Clone)]
struct MetadataHint {
    storage_class: Option<StorageClass>,
    archive_status: Option<ArchiveStatus>,
    e_tag: Option<String>,
    is_delete_marker: bool,
    tags: HashMap<String, String>,
    existing_lineage_tag: Option<Uuid>,
}

pub struct WriteOutcome {
    pub summary: IngestSummary,
    pub pending_tag_writes: Vec<PendingTagWrite>,
}

/// Persist and project one batch of [`FlatEvent`]s. Expected to run
/// inside a single `conn.transaction(...)` call at the caller (the
/// scheduler), so that a batch either fully commits or leaves no trace.
pub fn write_batch(repo: &mut Repository, events: Vec<FlatEvent>) -> TrackerResult<WriteOutcome> {
    let mut summary = IngestSummary::default();
    let mut latest_seen: HashMap<VersionKey, OrderingKey> = HashMap::new();
    let mut metadata_hints: HashMap<VersionKey, MetadataHint> = HashMap::new();
    let mut touched_keys: Vec<(String, String)> = Vec::new();

    for event in events {
        let bucket_key = event.bucket_key();
        if !touched_keys.contains(&bucket_key) {
            touched_keys.push(bucket_key);
        }

        let new_event = NewStoreEvent {
            event_type: event.event_type.as_str().to_string(),
            event_time: event.event_time,
            sequencer: event.sequencer.clone(),
            bucket: event.bucket.clone(),
            key: event.key.clone(),
            version_id: event.version_id.clone(),
            size: event.size,
            e_tag: event.e_tag.clone(),
            reason: event.reason.clone(),
            is_delete_marker: event.is_delete_marker,
        };
        let (row, is_duplicate) = repo.insert_or_bump_duplicate(new_event)?;
        if is_duplicate {
            summary.duplicates += 1;
            continue;
        }
        summary.accepted += 1;

        let version_key = event.key_tuple();
        let new_ordering = OrderingKey { sequencer: row.sequencer.clone(), event_time: row.event_time, event_id: row.id };
        if let Some(prev) = latest_seen.get(&version_key) {
            if arrived_out_of_order(&new_ordering, prev) {
                repo.bump_reordered(row.id)?;
                summary.reordered += 1;
            }
        }
        latest_seen
            .entry(version_key.clone())
            .and_modify(|k| {
                if new_ordering > *k {
                    *k = new_ordering.clone();
                }
            })
            .or_insert(new_ordering);

        metadata_hints.entry(version_key).or_insert(MetadataHint {
            storage_class: event.storage_class,
            archive_status: event.archive_status,
            e_tag: event.e_tag.clone(),
            is_delete_marker: event.is_delete_marker,
            tags: event.tags.clone(),
            existing_lineage_tag: event.existing_lineage_tag,
        });
    }

    let mut pending_tag_writes = Vec::new();
    for (bucket, key) in touched_keys {
        let pending = project_and_apply(repo, &bucket, &key, &metadata_hints)?;
        pending_tag_writes.extend(pending);
    }

    Ok(WriteOutcome { summary, pending_tag_writes })
}

fn project_and_apply(
    repo: &mut Repository,
    bucket: &str,
    key: &str,
    metadata_hints: &HashMap<VersionKey, MetadataHint>,
) -> TrackerResult<Vec<PendingTagWrite>> {
    let rows = repo.events_for_keys(&[(bucket.to_string(), key.to_string())])?;
    let projected: Vec<ProjectedEvent> = rows
        .iter()
        .map(|row| ProjectedEvent {
            ordering: OrderingKey { sequencer: row.sequencer.clone(), event_time: row.event_time, event_id: row.id },
            event_type: EventType::parse(&row.event_type).unwrap_or(EventType::Created),
            is_delete_marker: row.is_delete_marker,
            version_id: row.version_id.clone(),
        })
        .collect();
    let versions = project_key(projected);
    let current_version_id = pick_current_version(&versions).map(|v| v.version_id.clone());

    let existing_objects = repo.objects_for_key(bucket, key)?;
    let mut pending_tag_writes = Vec::new();

    for version in &versions {
        let is_current = current_version_id.as_ref() == Some(&version.version_id);
        let existing = existing_objects.iter().find(|o| o.version_id == version.version_id);

        match (is_current, existing) {
            (true, Some(object)) => {
                repo.set_current_state(object.id, true)?;
                apply_metadata_hint(repo, object.id, None, version.head_event_type, metadata_hints, bucket, key, &version.version_id)?;
            }
            (true, None) => {
                let hint_key = (bucket.to_string(), key.to_string(), version.version_id.clone());
                let hint = metadata_hints.get(&hint_key).cloned().unwrap_or_default();
                let (lineage_id, needs_tag_write) = move_tracker::resolve_lineage(hint.existing_lineage_tag);
                let object = Object {
                    id: Uuid::new_v4(),
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    version_id: version.version_id.clone(),
                    created: Utc::now(),
                    lineage_id,
                    ordering: version.head.sequencer.clone(),
                    is_current_state: true,
                };
                let object_id = object.id;
                repo.insert_object(&object)?;
                apply_metadata_hint(repo, object_id, None, version.head_event_type, metadata_hints, bucket, key, &version.version_id)?;

                if needs_tag_write {
                    pending_tag_writes.push(PendingTagWrite {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        version_id: version.version_id.clone(),
                        lineage_id,
                        existing_tags: hint.tags.clone(),
                    });
                }
            }
            (false, Some(object)) => {
                let historical = repo.demote_to_history(object.clone(), Utc::now())?;
                apply_metadata_hint(repo, object.id, Some(historical.id), version.head_event_type, metadata_hints, bucket, key, &version.version_id)?;
            }
            (false, None) => {
                // A version can be created and superseded within the same
                // batch: it never had a chance to be current, but it still
                // needs an Object row before it can be demoted, or it
                // vanishes instead of landing in history.
                let hint_key = (bucket.to_string(), key.to_string(), version.version_id.clone());
                let hint = metadata_hints.get(&hint_key).cloned().unwrap_or_default();
                let (lineage_id, needs_tag_write) = move_tracker::resolve_lineage(hint.existing_lineage_tag);
                let object = Object {
                    id: Uuid::new_v4(),
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    version_id: version.version_id.clone(),
                    created: Utc::now(),
                    lineage_id,
                    ordering: version.head.sequencer.clone(),
                    is_current_state: false,
                };
                let object_id = object.id;
                repo.insert_object(&object)?;
                let historical = repo.demote_to_history(object, Utc::now())?;
                apply_metadata_hint(repo, object_id, Some(historical.id), version.head_event_type, metadata_hints, bucket, key, &version.version_id)?;

                if needs_tag_write {
                    pending_tag_writes.push(PendingTagWrite {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        version_id: version.version_id.clone(),
                        lineage_id,
                        existing_tags: hint.tags.clone(),
                    });
                }
            }
        }
    }

    Ok(pending_tag_writes)
}

#[allow(clippy::too_many_arguments)]
fn apply_metadata_hint(
    repo: &mut Repository,
    object_id: Uuid,
    demoted_historical_id: Option<Uuid>,
    head_event_type: EventType,
    metadata_hints: &HashMap<VersionKey, MetadataHint>,
    bucket: &str,
    key: &str,
    version_id: &Option<String>,
) -> TrackerResult<()> {
    let hint_key = (bucket.to_string(), key.to_string(), version_id.clone());
    let Some(hint) = metadata_hints.get(&hint_key) else { return Ok(()) };

    let (target_object_id, target_historical_id) = match demoted_historical_id {
        Some(historical_id) => (None, Some(historical_id)),
        None => (Some(object_id), None),
    };

    let accessible_marker_state = hint.is_delete_marker;
    let row = S3Metadata {
        id: Uuid::new_v4(),
        object_id: target_object_id,
        historical_object_id: target_historical_id,
        storage_class: hint.storage_class.map(StorageClass::as_str).map(str::to_string),
        last_modified_date: Some(Utc::now()),
        e_tag: hint.e_tag.clone(),
        is_delete_marker: accessible_marker_state,
        expiration: None,
        restored: matches!(head_event_type, EventType::Restored | EventType::CrawlRestored),
        archive_status: hint.archive_status.map(|a| match a {
            ArchiveStatus::ArchiveAccess => "ARCHIVE_ACCESS",
            ArchiveStatus::DeepArchiveAccess => "DEEP_ARCHIVE_ACCESS",
        }.to_string()),
        metadata: serde_json::Value::Object(Default::default()),
        tags: serde_json::to_value(&hint.tags).unwrap_or(serde_json::Value::Null),
    };

    match target_object_id {
        Some(id) => repo.upsert_metadata_for_object(id, row)?,
        None => {
            // Historical rows only get a metadata row on the demotion that
            // creates them; there is no upsert-by-historical-id path since
            // history is append-only.
            repo.insert_metadata_for_historical(row)?;
        }
    };

    Ok(())
}
