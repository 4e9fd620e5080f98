//! gzip-CSV container reader. S3 inventory CSV reports carry no
//! header row — column order comes from the manifest's `fileSchema` —
//! so row decoding is schema-driven rather than header-driven.

use std::collections::HashMap;
use std::io::Read;

use chrono::{DateTime, Utc};

use filetracker_core::error::TrackerError;
use filetracker_core::model::{EventType, FlatEvent, FlatEventSource, StorageClass};

struct SchemaIndex {
    positions: HashMap<String, usize>,
}

impl SchemaIndex {
    fn build(schema: &[String]) -> Self {
        Self { positions: schema.iter().enumerate().map(|(i, name)| (name.clone(), i)).collect() }
    }

    fn get<'a>(&self, record: &'a csv::StringRecord, column: &str) -> Option<&'a str> {
        self.positions.get(column).and_then(|&i| record.get(i))
    }
}

fn event_type_for_row(storage_class: Option<StorageClass>, archive_status_column: Option<&str>) -> EventType {
    let restored = archive_status_column.map(|v| v.eq_ignore_ascii_case("RESTORED")).unwrap_or(false);
    match (storage_class, restored) {
        (Some(StorageClass::Glacier | StorageClass::DeepArchive), true) => EventType::CrawlRestored,
        _ => EventType::Crawl,
    }
}

fn record_to_event(
    record: &csv::StringRecord,
    index: &SchemaIndex,
    file_key: &str,
    file_last_modified: DateTime<Utc>,
) -> Result<FlatEvent, TrackerError> {
    let bucket = index
        .get(record, "Bucket")
        .ok_or_else(|| TrackerError::InventoryCorrupt { key: file_key.to_string() })?
        .to_string();
    let key = index
        .get(record, "Key")
        .ok_or_else(|| TrackerError::InventoryCorrupt { key: file_key.to_string() })?
        .to_string();

    let version_id = index.get(record, "VersionId").filter(|s| !s.is_empty()).map(str::to_string);
    let size = index.get(record, "Size").and_then(|s| s.parse::<i64>().ok());
    let e_tag = index.get(record, "ETag").filter(|s| !s.is_empty()).map(str::to_string);
    let storage_class = index.get(record, "StorageClass").and_then(StorageClass::parse);
    let is_delete_marker =
        index.get(record, "IsDeleteMarker").map(|s| s.eq_ignore_ascii_case("true")).unwrap_or(false);
    let event_time = index
        .get(record, "LastModifiedDate")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(file_last_modified);

    let event_type = if is_delete_marker {
        EventType::Deleted
    } else {
        event_type_for_row(storage_class, index.get(record, "ArchiveStatus"))
    };

    Ok(FlatEvent {
        source: FlatEventSource::Inventory,
        event_type,
        event_time,
        sequencer: None,
        bucket,
        key,
        version_id,
        size,
        e_tag,
        reason: None,
        is_delete_marker,
        storage_class,
        archive_status: None,
        existing_lineage_tag: None,
        tags: HashMap::new(),
    })
}

/// Stream a gzip-CSV inventory file in bounded batches of at most
/// `batch_size` rows, invoking `on_batch` for each. Keeps memory use
/// proportional to one batch, not the whole file.
pub fn stream_gzip_csv<R: Read, F: FnMut(Vec<FlatEvent>) -> Result<(), TrackerError>>(
    reader: R,
    schema: &[String],
    file_key: &str,
    file_last_modified: DateTime<Utc>,
    batch_size: usize,
    mut on_batch: F,
) -> Result<(), TrackerError> {
    let gz = flate2::read::GzDecoder::new(reader);
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(false).from_reader(gz);
    let index = SchemaIndex::build(schema);

    let mut batch = Vec::with_capacity(batch_size.max(1));
    for result in csv_reader.records() {
        let record = result.map_err(|_| TrackerError::InventoryCorrupt { key: file_key.to_string() })?;
        batch.push(record_to_event(&record, &index, file_key, file_last_modified)?);
        if batch.len() >= batch_size {
            on_batch(std::mem::take(&mut batch))?;
        }
    }
    if !batch.is_empty() {
        on_batch(batch)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip(contents: &str) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(contents.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn streams_rows_into_flat_events() {
        let schema =
            vec!["Bucket".to_string(), "Key".to_string(), "Size".to_string(), "StorageClass".to_string()];
        let csv_body = "my-bucket,data/a.txt,100,STANDARD\nmy-bucket,data/b.txt,200,GLACIER\n";
        let gz = gzip(csv_body);

        let mut seen = Vec::new();
        stream_gzip_csv(gz.as_slice(), &schema, "f1.csv.gz", Utc::now(), 10, |batch| {
            seen.extend(batch);
            Ok(())
        })
        .unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].key, "data/a.txt");
        assert_eq!(seen[1].storage_class, Some(StorageClass::Glacier));
        assert!(matches!(seen[0].event_type, EventType::Crawl));
    }

    #[test]
    fn respects_the_batch_size_boundary() {
        let schema = vec!["Bucket".to_string(), "Key".to_string()];
        let csv_body = "b,k1\nb,k2\nb,k3\n";
        let gz = gzip(csv_body);

        let mut batch_sizes = Vec::new();
        stream_gzip_csv(gz.as_slice(), &schema, "f1.csv.gz", Utc::now(), 2, |batch| {
            batch_sizes.push(batch.len());
            Ok(())
        })
        .unwrap();

        assert_eq!(batch_sizes, vec![2, 1]);
    }

    #[test]
    fn delete_marker_rows_decode_as_deleted_with_the_flag_set() {
        let schema = vec!["Bucket".to_string(), "Key".to_string(), "IsDeleteMarker".to_string()];
        let gz = gzip("my-bucket,data/a.txt,true\n");
        let mut seen = Vec::new();
        stream_gzip_csv(gz.as_slice(), &schema, "f1.csv.gz", Utc::now(), 10, |batch| {
            seen.extend(batch);
            Ok(())
        })
        .unwrap();
        assert!(matches!(seen[0].event_type, EventType::Deleted));
        assert!(seen[0].is_delete_marker);
    }
}
