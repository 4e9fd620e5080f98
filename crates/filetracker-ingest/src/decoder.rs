//! Event Decoder: turns a raw object-store notification or crawl
//! control message into a [`FlatEvent`]. Unknown fields are ignored;
//! missing `bucket`/`key` fails only the offending record.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use filetracker_core::error::TrackerError;
use filetracker_core::model::{EventType, FlatEvent, FlatEventSource};

/// Fixed event-type mapping table, accepting both the AWS EventBridge
/// detail-types and their plain-English equivalents. Preserves the
/// distinction between a permanent delete and delete-marker creation via
/// the returned `is_delete_marker` flag rather than a distinct
/// `EventType`, since the enum has no separate variant for it.
fn map_detail_type(detail_type: &str) -> Option<(EventType, bool)> {
    match detail_type {
        "ObjectCreated:Put"
        | "ObjectCreated:Post"
        | "ObjectCreated:Copy"
        | "ObjectCreated:CompleteMultipartUpload"
        | "Object Created" => Some((EventType::Created, false)),

        "ObjectRemoved:Delete" | "Object Deleted" => Some((EventType::Deleted, false)),

        "ObjectRemoved:DeleteMarkerCreated" | "Object Delete Marker Created" => {
            Some((EventType::Deleted, true))
        }

        "LifecycleExpiration:Delete" | "Object Lifecycle Expiration Delete" => {
            Some((EventType::DeletedLifecycle, false))
        }

        "ObjectRestore:Completed" | "Object Restore Completed" => Some((EventType::Restored, false)),
        "ObjectRestore:Delete" | "Object Restore Expired" => Some((EventType::RestoreExpired, false)),

        "LifecycleTransition" | "Object Storage Class Changed" => {
            Some((EventType::StorageClassChanged, false))
        }

        "ObjectTagging:Put" | "Object Tags Added" => Some((EventType::TaggingCreated, false)),
        "ObjectTagging:Delete" | "Object Tags Deleted" => Some((EventType::TaggingDeleted, false)),

        _ => None,
    }
}

fn percent_decode_once(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(value) = u8::from_str_radix(hex, 16) {
                    out.push(value);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn required_str(value: &Value, pointer: &str) -> Result<String, TrackerError> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TrackerError::Malformed { message: format!("missing required field {pointer}") })
}

/// Decode one object-store notification in the EventBridge shape:
/// `detail.bucket.name`, `detail.object.*`, `detail-type`, `time`,
/// `detail.reason`.
pub fn decode_object_store_event(raw: &Value) -> Result<FlatEvent, TrackerError> {
    let detail_type = required_str(raw, "/detail-type")?;
    let (event_type, is_delete_marker) = map_detail_type(&detail_type).ok_or_else(|| TrackerError::Malformed {
        message: format!("unrecognized detail-type: {detail_type}"),
    })?;

    let bucket = required_str(raw, "/detail/bucket/name")?;
    let key_raw = required_str(raw, "/detail/object/key")?;
    let key = percent_decode_once(&key_raw);

    let event_time = raw
        .pointer("/time")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let sequencer = raw.pointer("/detail/object/sequencer").and_then(Value::as_str).map(str::to_string);
    let version_id = raw.pointer("/detail/object/version-id").and_then(Value::as_str).map(str::to_string);
    let size = raw.pointer("/detail/object/size").and_then(Value::as_i64);
    let e_tag = raw.pointer("/detail/object/etag").and_then(Value::as_str).map(str::to_string);
    let reason = raw.pointer("/detail/reason").and_then(Value::as_str).map(str::to_string);

    Ok(FlatEvent {
        source: FlatEventSource::ObjectStore,
        event_type,
        event_time,
        sequencer,
        bucket,
        key,
        version_id,
        size,
        e_tag,
        reason,
        is_delete_marker,
        storage_class: None,
        archive_status: None,
        existing_lineage_tag: None,
        tags: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event(detail_type: &str) -> Value {
        json!({
            "detail-type": detail_type,
            "time": "2024-03-01T12:00:00Z",
            "detail": {
                "bucket": { "name": "my-bucket" },
                "object": {
                    "key": "some%20file.txt",
                    "size": 42,
                    "etag": "abc123",
                    "version-id": "v1",
                    "sequencer": "0055AED6DCD90281E5"
                },
                "reason": "PutObject"
            }
        })
    }

    #[test]
    fn decodes_created_event_and_percent_decodes_key_once() {
        let event = decode_object_store_event(&sample_event("ObjectCreated:Put")).unwrap();
        assert_eq!(event.key, "some file.txt");
        assert_eq!(event.bucket, "my-bucket");
        assert!(matches!(event.event_type, EventType::Created));
        assert!(!event.is_delete_marker);
        assert_eq!(event.sequencer.as_deref(), Some("0055AED6DCD90281E5"));
    }

    #[test]
    fn distinguishes_delete_marker_from_permanent_delete() {
        let marker = decode_object_store_event(&sample_event("ObjectRemoved:DeleteMarkerCreated")).unwrap();
        assert!(marker.is_delete_marker);
        let delete = decode_object_store_event(&sample_event("ObjectRemoved:Delete")).unwrap();
        assert!(!delete.is_delete_marker);
    }

    #[test]
    fn missing_bucket_fails_only_that_record() {
        let mut raw = sample_event("ObjectCreated:Put");
        raw.as_object_mut().unwrap().get_mut("detail").unwrap().as_object_mut().unwrap().remove("bucket");
        assert!(matches!(decode_object_store_event(&raw), Err(TrackerError::Malformed { .. })));
    }

    #[test]
    fn unknown_detail_type_is_malformed_not_a_panic() {
        let raw = sample_event("SomeFutureEventType");
        assert!(matches!(decode_object_store_event(&raw), Err(TrackerError::Malformed { .. })));
    }
}
