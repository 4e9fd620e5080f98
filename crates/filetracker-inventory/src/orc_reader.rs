//! ORC container reader. `orc-rust` exposes the same Arrow
//! `RecordBatch` shape as the Parquet crate, so decoding reuses
//! [`crate::arrow_rows`].

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use orc_rust::arrow_reader::ArrowReaderBuilder;

use filetracker_core::error::TrackerError;
use filetracker_core::model::FlatEvent;

use crate::arrow_rows::batch_to_events;

/// Stream an ORC inventory file, invoking `on_batch` once per stripe
/// batch read from the file.
pub fn stream_orc_file<F: FnMut(Vec<FlatEvent>) -> Result<(), TrackerError>>(
    path: &Path,
    file_key: &str,
    file_last_modified: DateTime<Utc>,
    mut on_batch: F,
) -> Result<(), TrackerError> {
    let file = File::open(path)?;
    let reader = ArrowReaderBuilder::try_new(file)
        .map_err(|e| TrackerError::InvalidManifest(e.to_string()))?
        .build();

    for batch_result in reader {
        let batch = batch_result.map_err(|_| TrackerError::InventoryCorrupt { key: file_key.to_string() })?;
        on_batch(batch_to_events(&batch, file_key, file_last_modified)?)?;
    }
    Ok(())
}
