//! Processes one inventory manifest: downloads it, verifies each data
//! file's MD5, decodes by container format, and feeds the resulting
//! `Crawl`/`CrawlRestored` records through the same scheduler as the
//! event stream (injects directly at the sequencer).

use clap::Parser;

use filetracker_app::{bootstrap, build_store_client, spawn_scheduler};
use filetracker_core::error::TrackerResult;
use filetracker_ingest::StoreClient;
use filetracker_inventory::{parse_manifest, run_inventory_job};

#[derive(Parser)]
struct Args {
    #[arg(long)]
    manifest_bucket: String,
    #[arg(long)]
    manifest_key: String,
}

#[tokio::main]
async fn main() -> TrackerResult<()> {
    let args = Args::parse();
    let runtime = bootstrap().await?;
    let store_client = build_store_client().await;
    let (scheduler, _shards) = spawn_scheduler(&runtime, store_client.clone());

    let (raw_manifest, _) = store_client.get_object(&args.manifest_bucket, &args.manifest_key).await?;
    let manifest = parse_manifest(&raw_manifest)?;

    let mut buffered_batches = Vec::new();
    let job_summary = run_inventory_job(store_client.as_ref(), &manifest, |batch| {
        buffered_batches.push(batch);
        Ok(())
    })
    .await?;

    tracing::info!(
        files_processed = job_summary.files_processed,
        files_corrupt = job_summary.files_corrupt,
        files_unsupported = job_summary.files_unsupported,
        rows_emitted = job_summary.rows_emitted,
        "inventory manifest processed"
    );

    for batch in buffered_batches {
        for event in batch {
            if scheduler.submit(event).await.is_err() {
                tracing::error!("scheduler shard channel closed during inventory submission");
                return Ok(());
            }
        }
    }

    Ok(())
}
