//! Reconciliation sweep for lineage tag write-backs that failed at
//! ingest time. Meant to run periodically (cron, scheduled task) rather
//! than as a long-lived process: drains one batch of `pending_tag_write`
//! rows per invocation.

use filetracker_app::{bootstrap, build_store_client};
use filetracker_core::error::TrackerResult;
use filetracker_ingest::retry_pending_tag_writes;

#[tokio::main]
async fn main() -> TrackerResult<()> {
    let runtime = bootstrap().await?;
    let store_client = build_store_client().await;

    let summary = retry_pending_tag_writes(
        &runtime.pool,
        &store_client,
        &runtime.config.store.tag_key_name,
        runtime.config.ingest.tag_retry_batch_size,
    )
    .await?;

    tracing::info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        still_failing = summary.still_failing,
        "tag-retry sweep complete"
    );

    Ok(())
}
