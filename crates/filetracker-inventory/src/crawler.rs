//! Crawler: an on-demand `(bucket, prefix)` listing that synthesizes
//! `Crawl` records for everything found. Reuses the move tracker's
//! first-`Created`-event path for every discovered object, including
//! the tag write-back — a crawl is the only source that can discover an
//! object the engine has never seen before with no event to carry a
//! lineage tag.

use std::collections::HashMap;

use filetracker_core::error::TrackerResult;
use filetracker_core::model::{EventType, FlatEvent, FlatEventSource};
use filetracker_ingest::move_tracker::{lineage_tag_set, resolve_lineage};
use filetracker_ingest::StoreClient;

#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlSummary {
    pub n_objects: u64,
    pub n_bytes: u64,
}

/// Crawl one `(bucket, prefix)`, synthesizing a `Crawl` [`FlatEvent`] per
/// discovered object and writing back a lineage tag to any object that
/// doesn't already carry one. Never alters an existing `lineage_id`.
pub async fn crawl_prefix(
    client: &dyn StoreClient,
    bucket: &str,
    prefix: &str,
    tag_key_name: &str,
) -> TrackerResult<(Vec<FlatEvent>, CrawlSummary)> {
    let listed = client.list_objects(bucket, prefix).await?;
    let mut events = Vec::with_capacity(listed.len());
    let mut summary = CrawlSummary::default();

    for object in listed {
        summary.n_objects += 1;
        summary.n_bytes += object.size.max(0) as u64;

        let existing_tags = client.get_object_tagging(bucket, &object.key, None).await.unwrap_or_default();
        let existing_lineage_tag =
            existing_tags.get(tag_key_name).and_then(|raw| filetracker_core::lineage::parse_tag_value(raw));

        let (lineage_id, needs_write) = resolve_lineage(existing_lineage_tag);
        if needs_write {
            let tags = lineage_tag_set(&existing_tags, tag_key_name, lineage_id);
            if let Err(err) = client.put_object_tagging(bucket, &object.key, None, &tags).await {
                tracing::warn!(%bucket, key = %object.key, error = %err, "crawler failed to write back lineage tag");
            }
        }

        events.push(FlatEvent {
            source: FlatEventSource::Crawl,
            event_type: EventType::Crawl,
            event_time: object.last_modified,
            sequencer: None,
            bucket: bucket.to_string(),
            key: object.key,
            version_id: None,
            size: Some(object.size),
            e_tag: object.e_tag,
            reason: None,
            is_delete_marker: false,
            storage_class: object.storage_class,
            archive_status: None,
            existing_lineage_tag: Some(lineage_id),
            tags: HashMap::new(),
        });
    }

    Ok((events, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetracker_core::model::StorageClass;
    use filetracker_ingest::{ListedObject, MockStoreClient};

    #[tokio::test]
    async fn discovered_objects_without_a_tag_get_a_fresh_lineage_written_back() {
        let client = MockStoreClient::new().with_listing(
            "my-bucket",
            "data/",
            vec![ListedObject {
                key: "data/a.txt".to_string(),
                size: 100,
                e_tag: Some("etag1".to_string()),
                storage_class: Some(StorageClass::Standard),
                last_modified: chrono::Utc::now(),
            }],
        );

        let (events, summary) = crawl_prefix(&client, "my-bucket", "data/", "lineage-tag").await.unwrap();
        assert_eq!(summary.n_objects, 1);
        assert_eq!(summary.n_bytes, 100);
        assert_eq!(events.len(), 1);
        assert!(events[0].existing_lineage_tag.is_some());

        let written_tags = client.get_object_tagging("my-bucket", "data/a.txt", None).await.unwrap();
        assert!(written_tags.contains_key("lineage-tag"));
    }

    #[tokio::test]
    async fn an_object_that_already_carries_a_lineage_tag_keeps_it_unchanged() {
        let lineage_id = uuid::Uuid::new_v4();
        let mut tags = HashMap::new();
        tags.insert("lineage-tag".to_string(), filetracker_core::lineage::format_tag_value(lineage_id));

        let client = MockStoreClient::new()
            .with_listing(
                "my-bucket",
                "data/",
                vec![ListedObject {
                    key: "data/a.txt".to_string(),
                    size: 10,
                    e_tag: None,
                    storage_class: None,
                    last_modified: chrono::Utc::now(),
                }],
            )
            .with_tags("my-bucket", "data/a.txt", None, tags);

        let (events, _) = crawl_prefix(&client, "my-bucket", "data/", "lineage-tag").await.unwrap();
        assert_eq!(events[0].existing_lineage_tag, Some(lineage_id));
    }
}
