//! Shared Arrow `RecordBatch` → [`FlatEvent`] decoding, used by both the
//! Parquet and ORC readers since both container formats hand back Arrow
//! batches.

use std::collections::HashMap;

use arrow::array::{Array, BooleanArray, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, TimeZone, Utc};

use filetracker_core::error::TrackerError;
use filetracker_core::model::{EventType, FlatEvent, FlatEventSource, StorageClass};

fn string_col(batch: &RecordBatch, name: &str, row: usize) -> Option<String> {
    let array = batch.column_by_name(name)?.as_any().downcast_ref::<StringArray>()?;
    (!array.is_null(row)).then(|| array.value(row).to_string())
}

fn int_col(batch: &RecordBatch, name: &str, row: usize) -> Option<i64> {
    let array = batch.column_by_name(name)?.as_any().downcast_ref::<Int64Array>()?;
    (!array.is_null(row)).then(|| array.value(row))
}

fn bool_col(batch: &RecordBatch, name: &str, row: usize) -> bool {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<BooleanArray>())
        .map(|array| !array.is_null(row) && array.value(row))
        .unwrap_or(false)
}

fn timestamp_col(batch: &RecordBatch, name: &str, row: usize, fallback: DateTime<Utc>) -> DateTime<Utc> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<TimestampMicrosecondArray>())
        .filter(|array| !array.is_null(row))
        .and_then(|array| Utc.timestamp_micros(array.value(row)).single())
        .unwrap_or(fallback)
}

fn event_type_for_row(storage_class: Option<StorageClass>, archive_status_column: Option<&str>) -> EventType {
    let restored = archive_status_column.map(|v| v.eq_ignore_ascii_case("RESTORED")).unwrap_or(false);
    match (storage_class, restored) {
        (Some(StorageClass::Glacier | StorageClass::DeepArchive), true) => EventType::CrawlRestored,
        _ => EventType::Crawl,
    }
}

pub(crate) fn row_to_event(
    batch: &RecordBatch,
    row: usize,
    file_key: &str,
    file_last_modified: DateTime<Utc>,
) -> Result<FlatEvent, TrackerError> {
    let bucket = string_col(batch, "Bucket", row)
        .ok_or_else(|| TrackerError::InventoryCorrupt { key: file_key.to_string() })?;
    let key = string_col(batch, "Key", row)
        .ok_or_else(|| TrackerError::InventoryCorrupt { key: file_key.to_string() })?;
    let is_delete_marker = bool_col(batch, "IsDeleteMarker", row);
    let storage_class = string_col(batch, "StorageClass", row).as_deref().and_then(StorageClass::parse);
    let archive_status_column = string_col(batch, "ArchiveStatus", row);
    let event_type = if is_delete_marker {
        EventType::Deleted
    } else {
        event_type_for_row(storage_class, archive_status_column.as_deref())
    };

    Ok(FlatEvent {
        source: FlatEventSource::Inventory,
        event_type,
        event_time: timestamp_col(batch, "LastModifiedDate", row, file_last_modified),
        sequencer: None,
        bucket,
        key,
        version_id: string_col(batch, "VersionId", row),
        size: int_col(batch, "Size", row),
        e_tag: string_col(batch, "ETag", row),
        reason: None,
        is_delete_marker,
        storage_class,
        archive_status: None,
        existing_lineage_tag: None,
        tags: HashMap::new(),
    })
}

pub(crate) fn batch_to_events(
    batch: &RecordBatch,
    file_key: &str,
    file_last_modified: DateTime<Utc>,
) -> Result<Vec<FlatEvent>, TrackerError> {
    (0..batch.num_rows()).map(|row| row_to_event(batch, row, file_key, file_last_modified)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_to_event_rejects_a_row_without_a_bucket_column() {
        use arrow::datatypes::{DataType, Field, Schema};
        use std::sync::Arc;

        let schema = Arc::new(Schema::new(vec![Field::new("Key", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["k"]))]).unwrap();
        let result = row_to_event(&batch, 0, "f1.parquet", Utc::now());
        assert!(matches!(result, Err(TrackerError::InventoryCorrupt { .. })));
    }

    #[test]
    fn a_restored_glacier_row_decodes_as_crawl_restored() {
        use arrow::datatypes::{DataType, Field, Schema};
        use std::sync::Arc;

        let schema = Arc::new(Schema::new(vec![
            Field::new("Bucket", DataType::Utf8, false),
            Field::new("Key", DataType::Utf8, false),
            Field::new("StorageClass", DataType::Utf8, true),
            Field::new("ArchiveStatus", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["my-bucket"])),
                Arc::new(StringArray::from(vec!["data/a.txt"])),
                Arc::new(StringArray::from(vec!["GLACIER"])),
                Arc::new(StringArray::from(vec!["RESTORED"])),
            ],
        )
        .unwrap();

        let event = row_to_event(&batch, 0, "f1.parquet", Utc::now()).unwrap();
        assert!(matches!(event.event_type, EventType::CrawlRestored));
        assert_eq!(event.storage_class, Some(StorageClass::Glacier));
    }

    #[test]
    fn a_glacier_row_without_restored_status_decodes_as_plain_crawl() {
        use arrow::datatypes::{DataType, Field, Schema};
        use std::sync::Arc;

        let schema = Arc::new(Schema::new(vec![
            Field::new("Bucket", DataType::Utf8, false),
            Field::new("Key", DataType::Utf8, false),
            Field::new("StorageClass", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["my-bucket"])),
                Arc::new(StringArray::from(vec!["data/a.txt"])),
                Arc::new(StringArray::from(vec!["GLACIER"])),
            ],
        )
        .unwrap();

        let event = row_to_event(&batch, 0, "f1.parquet", Utc::now()).unwrap();
        assert!(matches!(event.event_type, EventType::Crawl));
    }
}
