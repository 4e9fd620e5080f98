//! Ties the manifest model to the container readers: downloads each
//! data file, verifies its MD5 against the manifest, dispatches by
//! container format, and feeds decoded batches to the ingest writer via
//! a caller-supplied sink. A corrupt file is skipped, not fatal.

use std::io::Write as _;

use tempfile::NamedTempFile;

use filetracker_core::error::{TrackerError, TrackerResult};
use filetracker_core::model::FlatEvent;
use filetracker_ingest::StoreClient;

use crate::csv_reader::stream_gzip_csv;
use crate::manifest::{verify_md5, ContainerFormat, InventoryFile, InventoryManifest};
use crate::orc_reader::stream_orc_file;
use crate::parquet_reader::stream_parquet_file;

#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryJobSummary {
    pub files_processed: u64,
    pub files_corrupt: u64,
    pub files_unsupported: u64,
    pub rows_emitted: u64,
}

/// Process every file named in a manifest, reading from `destination_bucket`.
/// `on_batch` is handed each decoded batch of [`FlatEvent`]s (typically
/// wired to [`filetracker_ingest::write_batch`] by the caller); this
/// function never touches the database itself.
pub async fn run_inventory_job<F>(
    client: &dyn StoreClient,
    manifest: &InventoryManifest,
    mut on_batch: F,
) -> TrackerResult<InventoryJobSummary>
where
    F: FnMut(Vec<FlatEvent>) -> TrackerResult<()>,
{
    let mut summary = InventoryJobSummary::default();

    for file in &manifest.files {
        match process_one_file(client, manifest, file, &mut on_batch).await {
            Ok(rows) => {
                summary.files_processed += 1;
                summary.rows_emitted += rows;
            }
            Err(TrackerError::InventoryCorrupt { key }) => {
                tracing::warn!(%key, "inventory file failed MD5 verification, skipping");
                summary.files_corrupt += 1;
            }
            Err(TrackerError::InvalidManifest(reason)) => {
                tracing::warn!(key = %file.key, %reason, "unsupported inventory container format, skipping");
                summary.files_unsupported += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(summary)
}

async fn process_one_file<F>(
    client: &dyn StoreClient,
    manifest: &InventoryManifest,
    file: &InventoryFile,
    on_batch: &mut F,
) -> TrackerResult<u64>
where
    F: FnMut(Vec<FlatEvent>) -> TrackerResult<()>,
{
    let format = ContainerFormat::detect(&file.key)
        .ok_or_else(|| TrackerError::InvalidManifest(format!("no known container format for {}", file.key)))?;

    let (contents, file_last_modified) = client.get_object(&manifest.destination_bucket, &file.key).await?;
    if !verify_md5(&contents, &file.md5_checksum) {
        return Err(TrackerError::InventoryCorrupt { key: file.key.clone() });
    }

    let mut rows = 0u64;

    match format {
        ContainerFormat::GzipCsv => {
            stream_gzip_csv(contents.as_slice(), &manifest.file_schema, &file.key, file_last_modified, 1000, |batch| {
                rows += batch.len() as u64;
                on_batch(batch)
            })?;
        }
        ContainerFormat::Parquet | ContainerFormat::Orc => {
            let mut tmp = NamedTempFile::new().map_err(TrackerError::Io)?;
            tmp.write_all(&contents).map_err(TrackerError::Io)?;
            tmp.flush().map_err(TrackerError::Io)?;

            if format == ContainerFormat::Parquet {
                stream_parquet_file(tmp.path(), &file.key, file_last_modified, |batch| {
                    rows += batch.len() as u64;
                    on_batch(batch)
                })?;
            } else {
                stream_orc_file(tmp.path(), &file.key, file_last_modified, |batch| {
                    rows += batch.len() as u64;
                    on_batch(batch)
                })?;
            }
        }
    }

    Ok(rows)
}
