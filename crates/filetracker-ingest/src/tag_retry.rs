//! Reconciliation sweep for lineage tag write-backs that failed at
//! ingest time. The scheduler never blocks a batch on a tag write, so a
//! failure is persisted as a [`PendingTagWriteRow`] instead of only
//! logged; this module is what drains that table.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use filetracker_core::error::{TrackerError, TrackerResult};
use filetracker_db::models::PendingTagWriteRow;
use filetracker_db::{get_connection, DbPool, Repository};

use crate::enricher::StoreClient;
use crate::move_tracker::{lineage_tag_set, PendingTagWrite};

/// Build the row to persist for a tag write that failed on its first
/// attempt, during ingestion.
pub fn to_row(write: &PendingTagWrite, last_error: &str) -> PendingTagWriteRow {
    PendingTagWriteRow {
        id: Uuid::new_v4(),
        bucket: write.bucket.clone(),
        key: write.key.clone(),
        version_id: write.version_id.clone(),
        lineage_id: write.lineage_id,
        existing_tags: serde_json::to_value(&write.existing_tags).unwrap_or(serde_json::Value::Null),
        attempts: 0,
        last_error: Some(last_error.to_string()),
        created_at: chrono::Utc::now(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RetrySummary {
    pub attempted: u64,
    pub succeeded: u64,
    pub still_failing: u64,
}

async fn run_blocking<T, F>(pool: &DbPool, f: F) -> TrackerResult<T>
where
    F: FnOnce(&mut Repository) -> TrackerResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = get_connection(&pool)?;
        let mut repo = Repository::new(&mut conn);
        f(&mut repo)
    })
    .await
    .map_err(|_| TrackerError::Cancelled)?
}

/// Drain up to `limit` due rows, retrying each tag write-back against the
/// object store. A row that succeeds is deleted; one that fails again
/// has its attempt counter bumped and is left for the next sweep.
pub async fn retry_pending_tag_writes(
    pool: &DbPool,
    client: &Arc<dyn StoreClient>,
    tag_key_name: &str,
    limit: i64,
) -> TrackerResult<RetrySummary> {
    let due = run_blocking(pool, move |repo| repo.due_pending_tag_writes(limit)).await?;

    let mut summary = RetrySummary::default();
    for row in due {
        summary.attempted += 1;
        let existing_tags: HashMap<String, String> =
            serde_json::from_value(row.existing_tags.clone()).unwrap_or_default();
        let tags = lineage_tag_set(&existing_tags, tag_key_name, row.lineage_id);
        let result = client.put_object_tagging(&row.bucket, &row.key, row.version_id.as_deref(), &tags).await;

        match result {
            Ok(()) => {
                summary.succeeded += 1;
                let id = row.id;
                run_blocking(pool, move |repo| repo.delete_pending_tag_write(id)).await?;
            }
            Err(err) => {
                summary.still_failing += 1;
                tracing::warn!(bucket = %row.bucket, key = %row.key, error = %err, "tag write-back retry failed again");
                let id = row.id;
                let message = err.to_string();
                run_blocking(pool, move |repo| repo.bump_pending_tag_write_attempt(id, &message)).await?;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_row_carries_the_pending_write_fields_and_the_failure_reason() {
        let write = PendingTagWrite {
            bucket: "my-bucket".to_string(),
            key: "data/a.txt".to_string(),
            version_id: Some("v1".to_string()),
            lineage_id: Uuid::new_v4(),
            existing_tags: HashMap::new(),
        };
        let row = to_row(&write, "timed out");
        assert_eq!(row.bucket, write.bucket);
        assert_eq!(row.key, write.key);
        assert_eq!(row.lineage_id, write.lineage_id);
        assert_eq!(row.attempts, 0);
        assert_eq!(row.last_error.as_deref(), Some("timed out"));
    }
}
