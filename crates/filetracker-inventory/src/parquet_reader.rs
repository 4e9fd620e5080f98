//! Parquet container reader. Reads one `RecordBatch` at a time via
//! Arrow's row-group batching, so memory stays bounded by Arrow's own
//! batch size rather than the whole file.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use filetracker_core::error::TrackerError;
use filetracker_core::model::FlatEvent;

use crate::arrow_rows::batch_to_events;

/// Stream a Parquet inventory file, invoking `on_batch` once per Arrow
/// `RecordBatch` read from the file.
pub fn stream_parquet_file<F: FnMut(Vec<FlatEvent>) -> Result<(), TrackerError>>(
    path: &Path,
    file_key: &str,
    file_last_modified: DateTime<Utc>,
    mut on_batch: F,
) -> Result<(), TrackerError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| TrackerError::InvalidManifest(e.to_string()))?
        .build()
        .map_err(|e| TrackerError::InvalidManifest(e.to_string()))?;

    for batch_result in reader {
        let batch = batch_result.map_err(|_| TrackerError::InventoryCorrupt { key: file_key.to_string() })?;
        on_batch(batch_to_events(&batch, file_key, file_last_modified)?)?;
    }
    Ok(())
}
