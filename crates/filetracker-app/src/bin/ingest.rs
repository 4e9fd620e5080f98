//! Batch handler for the low-latency object-store event stream.
//! Reads newline-delimited JSON notifications from stdin, decodes,
//! enriches, and hands each event to the scheduler.

use std::io::{stdin, BufReader};

use tokio::sync::Semaphore;

use filetracker_app::{bootstrap, build_store_client, spawn_scheduler};
use filetracker_core::error::TrackerResult;
use filetracker_ingest::{decode_object_store_event, enrich_event, EventSource, JsonLinesEventSource, PermissionLogGate};

#[tokio::main]
async fn main() -> TrackerResult<()> {
    let runtime = bootstrap().await?;
    let store_client = build_store_client().await;
    let (scheduler, _shards) = spawn_scheduler(&runtime, store_client.clone());

    let semaphore = Semaphore::new(runtime.config.store.enrichment_request_budget);
    let permission_log = PermissionLogGate::new();
    let mut source = JsonLinesEventSource::new(BufReader::new(stdin()));

    loop {
        let raw_batch = source.poll().await?;
        if raw_batch.is_empty() {
            break;
        }

        for raw in raw_batch {
            let mut event = match decode_object_store_event(&raw) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping malformed notification");
                    continue;
                }
            };

            enrich_event(
                &mut event,
                store_client.as_ref(),
                &semaphore,
                &permission_log,
                &runtime.config.store.tag_key_name,
                runtime.config.store.max_enrichment_attempts,
                runtime.config.store.enrichment_timeout,
            )
            .await;

            if scheduler.submit(event).await.is_err() {
                tracing::error!("scheduler shard channel closed; stopping ingest");
                return Ok(());
            }
        }
    }

    Ok(())
}
