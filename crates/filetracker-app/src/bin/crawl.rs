//! On-demand crawl of a `(bucket, prefix)`, synthesizing `Crawl` records
//! and feeding them through the same scheduler as the event stream: the
//! crawler injects directly at the sequencer, same as inventory.

use clap::Parser;

use filetracker_app::{bootstrap, build_store_client, spawn_scheduler};
use filetracker_core::error::TrackerResult;
use filetracker_inventory::crawl_prefix;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    bucket: String,
    #[arg(long, default_value = "")]
    prefix: String,
}

#[tokio::main]
async fn main() -> TrackerResult<()> {
    let args = Args::parse();
    let runtime = bootstrap().await?;
    let store_client = build_store_client().await;
    let (scheduler, _shards) = spawn_scheduler(&runtime, store_client.clone());

    let (events, summary) =
        crawl_prefix(store_client.as_ref(), &args.bucket, &args.prefix, &runtime.config.store.tag_key_name).await?;
    tracing::info!(bucket = %args.bucket, prefix = %args.prefix, n_objects = summary.n_objects, n_bytes = summary.n_bytes, "crawl complete");

    for event in events {
        if scheduler.submit(event).await.is_err() {
            tracing::error!("scheduler shard channel closed during crawl submission");
            break;
        }
    }

    Ok(())
}
