//! Bulk inventory ingestion and on-demand crawling. Both
//! inject `FlatEvent`s directly at the Sequencer, the same as the
//! low-latency event stream, so neither module talks to the database
//! directly — callers feed the produced batches through
//! `filetracker_ingest::write_batch`.

mod arrow_rows;

pub mod crawler;
pub mod csv_reader;
pub mod job;
pub mod manifest;
pub mod orc_reader;
pub mod parquet_reader;

pub use crawler::{crawl_prefix, CrawlSummary};
pub use job::{run_inventory_job, InventoryJobSummary};
pub use manifest::{parse_manifest, verify_md5, ContainerFormat, InventoryFile, InventoryManifest};
