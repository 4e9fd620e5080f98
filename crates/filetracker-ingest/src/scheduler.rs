//! Worker-per-key-hash scheduler: a fixed array of bounded `tokio::mpsc`
//! channels, one per shard, each drained by a long-lived task that owns
//! sequencing and writing for its keys. Avoids a shared-mutex design
//! that would serialize every key behind one lock.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use diesel::connection::Connection;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use filetracker_core::model::{FlatEvent, IngestSummary};
use filetracker_db::{get_connection, DbPool, Repository};

use crate::enricher::StoreClient;
use crate::move_tracker::{lineage_tag_set, PendingTagWrite};
use crate::{tag_retry, writer};

fn shard_for(bucket: &str, key: &str, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    bucket.hash(&mut hasher);
    key.hash(&mut hasher);
    (hasher.finish() as usize) % shard_count
}

/// Routes incoming events to per-key-hash shards and owns the senders;
/// dropping it closes every channel, which drains each shard worker.
pub struct Scheduler {
    shards: Vec<mpsc::Sender<FlatEvent>>,
}

pub struct ScheduledShard {
    pub handle: JoinHandle<()>,
}

impl Scheduler {
    /// Spawn `shard_count` worker tasks, each with a bounded channel of
    /// `channel_capacity`. Returns the scheduler and the workers' join
    /// handles for graceful shutdown.
    pub fn spawn(
        shard_count: usize,
        channel_capacity: usize,
        batch_size: usize,
        pool: DbPool,
        store_client: Arc<dyn StoreClient>,
        tag_key_name: String,
    ) -> (Self, Vec<ScheduledShard>) {
        let mut shards = Vec::with_capacity(shard_count);
        let mut handles = Vec::with_capacity(shard_count);

        for _ in 0..shard_count {
            let (tx, rx) = mpsc::channel(channel_capacity);
            shards.push(tx);
            let pool = pool.clone();
            let store_client = store_client.clone();
            let tag_key_name = tag_key_name.clone();
            let handle = tokio::spawn(shard_loop(rx, pool, batch_size, store_client, tag_key_name));
            handles.push(ScheduledShard { handle });
        }

        (Self { shards }, handles)
    }

    /// Route one event to its owning shard. Events for the same
    /// `(bucket, key)` always land on the same shard, giving the
    /// single-partition serialization required without a shared lock.
    pub async fn submit(&self, event: FlatEvent) -> Result<(), mpsc::error::SendError<FlatEvent>> {
        let shard = shard_for(&event.bucket, &event.key, self.shards.len());
        self.shards[shard].send(event).await
    }
}

async fn shard_loop(
    mut rx: mpsc::Receiver<FlatEvent>,
    pool: DbPool,
    batch_size: usize,
    store_client: Arc<dyn StoreClient>,
    tag_key_name: String,
) {
    loop {
        let Some(first) = rx.recv().await else { return };
        let mut batch = Vec::with_capacity(batch_size);
        batch.push(first);
        while batch.len() < batch_size {
            match rx.try_recv() {
                Ok(event) => batch.push(event),
                Err(_) => break,
            }
        }

        let outcome = {
            let pool = pool.clone();
            tokio::task::spawn_blocking(move || -> filetracker_core::error::TrackerResult<writer::WriteOutcome> {
                let mut conn = get_connection(&pool)?;
                conn.transaction(|conn| {
                    let mut repo = Repository::new(conn);
                    writer::write_batch(&mut repo, batch)
                })
            })
            .await
        };

        match outcome {
            Ok(Ok(outcome)) => {
                log_summary(&outcome.summary);
                write_back_pending_tags(&store_client, &pool, &tag_key_name, outcome.pending_tag_writes).await;
            }
            // DB integrity errors are fatal for the batch: do not ack,
            // rely on redelivery + dedup. There is no queue handle here to
            // withhold an ack from — the production entrypoint (filetracker-app)
            // owns that and only acks once `submit` has been accepted.
            Ok(Err(err)) => tracing::error!(error = %err, "batch failed; relying on redelivery"),
            Err(join_err) => tracing::error!(error = %join_err, "writer task panicked"),
        }
    }
}

fn log_summary(summary: &IngestSummary) {
    tracing::info!(
        accepted = summary.accepted,
        malformed = summary.malformed,
        duplicates = summary.duplicates,
        reordered = summary.reordered,
        "batch committed"
    );
}

async fn write_back_pending_tags(
    client: &Arc<dyn StoreClient>,
    pool: &DbPool,
    tag_key_name: &str,
    pending: Vec<PendingTagWrite>,
) {
    for write in pending {
        let tags = lineage_tag_set(&write.existing_tags, tag_key_name, write.lineage_id);
        let result = client.put_object_tagging(&write.bucket, &write.key, write.version_id.as_deref(), &tags).await;
        if let Err(err) = result {
            // The lineage_id is already durable on the Object row; a failed
            // write-back is queued as a `pending_tag_write` row for the
            // tag-retry sweep, rather than just logged and dropped.
            tracing::warn!(bucket = %write.bucket, key = %write.key, error = %err, "lineage tag write-back failed, queuing for retry");
            let row = tag_retry::to_row(&write, &err.to_string());
            let pool = pool.clone();
            let persisted = tokio::task::spawn_blocking(move || -> filetracker_core::error::TrackerResult<()> {
                let mut conn = get_connection(&pool)?;
                let mut repo = Repository::new(&mut conn);
                repo.insert_pending_tag_write(&row)
            })
            .await;
            match persisted {
                Ok(Err(err)) => tracing::error!(error = %err, "failed to persist pending tag write for retry"),
                Err(join_err) => tracing::error!(error = %join_err, "pending tag write persistence task panicked"),
                Ok(Ok(())) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_always_maps_to_the_same_shard() {
        let a = shard_for("bucket", "path/to/object.txt", 8);
        let b = shard_for("bucket", "path/to/object.txt", 8);
        assert_eq!(a, b);
    }

    #[test]
    fn shard_index_is_within_bounds() {
        for key in ["a", "b", "some/long/key/path", ""] {
            assert!(shard_for("bucket", key, 16) < 16);
        }
    }
}
