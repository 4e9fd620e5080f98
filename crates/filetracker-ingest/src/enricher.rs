//! Metadata Enricher: best-effort HEAD-equivalent lookups against
//! the object store for records that didn't already carry storage class,
//! archive status, or a lineage tag.
//!
//! `StoreClient` is built the same way as other AWS SDK clients here:
//! `aws_config::load_defaults(aws_config::BehaviorVersion::latest())`
//! then `Client::new(&config)`, with a trait-plus-test-double split so
//! higher layers never depend on the concrete AWS type.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use filetracker_core::error::{TrackerError, TrackerResult};
use filetracker_core::lineage;
use filetracker_core::model::{ArchiveStatus, EventType, FlatEvent, StorageClass};

/// What a HEAD-equivalent lookup can tell us about an object.
#[derive(Debug, Clone, Default)]
pub struct HeadObjectInfo {
    pub storage_class: Option<StorageClass>,
    pub archive_status: Option<ArchiveStatus>,
    pub e_tag: Option<String>,
    pub size: Option<i64>,
}

/// One entry from a prefix listing, as consumed by the Crawler.
#[derive(Debug, Clone)]
pub struct ListedObject {
    pub key: String,
    pub size: i64,
    pub e_tag: Option<String>,
    pub storage_class: Option<StorageClass>,
    pub last_modified: DateTime<Utc>,
}

/// The object store collaborator. Kept narrow — exactly the operations
/// the enricher and move tracker need — so a mock implementation needs
/// no network stack.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> TrackerResult<Option<HeadObjectInfo>>;

    async fn get_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> TrackerResult<HashMap<String, String>>;

    async fn put_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        tags: &HashMap<String, String>,
    ) -> TrackerResult<()>;

    /// List every object under `(bucket, prefix)`, for the Crawler.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> TrackerResult<Vec<ListedObject>>;

    /// Download an object's bytes whole, for the Inventory Reader
    /// fetching a manifest and its data files. Returns the object's
    /// `LastModified` alongside the bytes so callers aren't forced to
    /// fall back to ingestion wall-clock time for per-file timestamps.
    async fn get_object(&self, bucket: &str, key: &str) -> TrackerResult<(Vec<u8>, DateTime<Utc>)>;
}

/// Production `StoreClient` backed by `aws-sdk-s3`.
pub struct S3StoreClient {
    client: aws_sdk_s3::Client,
}

impl S3StoreClient {
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self { client: aws_sdk_s3::Client::new(&config) }
    }

    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

fn classify_error<E: aws_sdk_s3::error::ProvideErrorMetadata>(err: &E, bucket: &str, key: &str) -> TrackerError {
    let message = err.message().unwrap_or("object store error").to_string();
    match err.code() {
        Some("AccessDenied") | Some("Forbidden") | Some("403") => {
            TrackerError::StorePermission { bucket: bucket.to_string(), key: key.to_string(), message }
        }
        _ => TrackerError::StoreTransient { bucket: bucket.to_string(), key: key.to_string(), message },
    }
}

#[async_trait]
impl StoreClient for S3StoreClient {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> TrackerResult<Option<HeadObjectInfo>> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await;

        match result {
            Ok(output) => Ok(Some(HeadObjectInfo {
                storage_class: output.storage_class().and_then(|sc| StorageClass::parse(sc.as_str())),
                archive_status: output.archive_status().and_then(|a| match a.as_str() {
                    "ARCHIVE_ACCESS" => Some(ArchiveStatus::ArchiveAccess),
                    "DEEP_ARCHIVE_ACCESS" => Some(ArchiveStatus::DeepArchiveAccess),
                    _ => None,
                }),
                e_tag: output.e_tag().map(str::to_string),
                size: output.content_length(),
            })),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(classify_error(&service_err, bucket, key))
                }
            }
        }
    }

    async fn get_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> TrackerResult<HashMap<String, String>> {
        let output = self
            .client
            .get_object_tagging()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|err| classify_error(&err.into_service_error(), bucket, key))?;

        Ok(output.tag_set().iter().map(|tag| (tag.key().to_string(), tag.value().to_string())).collect())
    }

    async fn put_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        tags: &HashMap<String, String>,
    ) -> TrackerResult<()> {
        let tag_set: Vec<aws_sdk_s3::types::Tag> = tags
            .iter()
            .map(|(k, v)| aws_sdk_s3::types::Tag::builder().key(k).value(v).build().expect("key and value are set"))
            .collect();
        let tagging = aws_sdk_s3::types::Tagging::builder().set_tag_set(Some(tag_set)).build().map_err(|e| {
            TrackerError::Malformed { message: format!("invalid tag set: {e}") }
        })?;

        self.client
            .put_object_tagging()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .tagging(tagging)
            .send()
            .await
            .map_err(|err| classify_error(&err.into_service_error(), bucket, key))?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> TrackerResult<Vec<ListedObject>> {
        let mut results = Vec::new();
        let mut continuation_token = None;
        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.clone())
                .send()
                .await
                .map_err(|err| classify_error(&err.into_service_error(), bucket, prefix))?;

            for object in output.contents() {
                results.push(ListedObject {
                    key: object.key().unwrap_or_default().to_string(),
                    size: object.size().unwrap_or(0),
                    e_tag: object.e_tag().map(str::to_string),
                    storage_class: object.storage_class().and_then(|sc| StorageClass::parse(sc.as_str())),
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::from_timestamp(t.secs(), 0))
                        .unwrap_or_else(Utc::now),
                });
            }

            continuation_token = output.next_continuation_token().map(str::to_string);
            if continuation_token.is_none() {
                break;
            }
        }
        Ok(results)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> TrackerResult<(Vec<u8>, DateTime<Utc>)> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify_error(&err.into_service_error(), bucket, key))?;
        let last_modified =
            output.last_modified().and_then(|t| DateTime::from_timestamp(t.secs(), 0)).unwrap_or_else(Utc::now);
        let bytes = output.body.collect().await.map_err(|e| TrackerError::StoreTransient {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok((bytes.into_bytes().to_vec(), last_modified))
    }
}

/// In-memory `StoreClient` test double.
#[derive(Default)]
pub struct MockStoreClient {
    objects: Mutex<HashMap<(String, String, Option<String>), HeadObjectInfo>>,
    tags: Mutex<HashMap<(String, String, Option<String>), HashMap<String, String>>>,
    denied: Mutex<std::collections::HashSet<(String, String)>>,
    listings: Mutex<HashMap<(String, String), Vec<ListedObject>>>,
    downloads: Mutex<HashMap<(String, String), (Vec<u8>, DateTime<Utc>)>>,
}

impl MockStoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, bucket: &str, key: &str, version_id: Option<&str>, info: HeadObjectInfo) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string(), version_id.map(str::to_string)), info);
        self
    }

    pub fn with_tags(self, bucket: &str, key: &str, version_id: Option<&str>, tags: HashMap<String, String>) -> Self {
        self.tags.lock().unwrap().insert((bucket.to_string(), key.to_string(), version_id.map(str::to_string)), tags);
        self
    }

    pub fn with_permission_denied(self, bucket: &str, key: &str) -> Self {
        self.denied.lock().unwrap().insert((bucket.to_string(), key.to_string()));
        self
    }

    pub fn with_listing(self, bucket: &str, prefix: &str, objects: Vec<ListedObject>) -> Self {
        self.listings.lock().unwrap().insert((bucket.to_string(), prefix.to_string()), objects);
        self
    }

    pub fn with_download(self, bucket: &str, key: &str, contents: Vec<u8>, last_modified: DateTime<Utc>) -> Self {
        self.downloads.lock().unwrap().insert((bucket.to_string(), key.to_string()), (contents, last_modified));
        self
    }
}

#[async_trait]
impl StoreClient for MockStoreClient {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> TrackerResult<Option<HeadObjectInfo>> {
        if self.denied.lock().unwrap().contains(&(bucket.to_string(), key.to_string())) {
            return Err(TrackerError::StorePermission {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "mock access denied".to_string(),
            });
        }
        let lookup_key = (bucket.to_string(), key.to_string(), version_id.map(str::to_string));
        Ok(self.objects.lock().unwrap().get(&lookup_key).cloned())
    }

    async fn get_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> TrackerResult<HashMap<String, String>> {
        let lookup_key = (bucket.to_string(), key.to_string(), version_id.map(str::to_string));
        Ok(self.tags.lock().unwrap().get(&lookup_key).cloned().unwrap_or_default())
    }

    async fn put_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        tags: &HashMap<String, String>,
    ) -> TrackerResult<()> {
        let lookup_key = (bucket.to_string(), key.to_string(), version_id.map(str::to_string));
        self.tags.lock().unwrap().insert(lookup_key, tags.clone());
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> TrackerResult<Vec<ListedObject>> {
        let lookup_key = (bucket.to_string(), prefix.to_string());
        Ok(self.listings.lock().unwrap().get(&lookup_key).cloned().unwrap_or_default())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> TrackerResult<(Vec<u8>, DateTime<Utc>)> {
        let lookup_key = (bucket.to_string(), key.to_string());
        self.downloads.lock().unwrap().get(&lookup_key).cloned().ok_or_else(|| TrackerError::StoreTransient {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: "mock object not found".to_string(),
        })
    }
}

/// Throttles permission-error logging to once per bucket per day.
#[derive(Default)]
pub struct PermissionLogGate {
    last_logged: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl PermissionLogGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_log(&self, bucket: &str) -> bool {
        let mut guard = self.last_logged.lock().unwrap();
        let now = Utc::now();
        match guard.get(bucket) {
            Some(last) if now.signed_duration_since(*last) < chrono::Duration::days(1) => false,
            _ => {
                guard.insert(bucket.to_string(), now);
                true
            }
        }
    }
}

fn should_enrich(event_type: EventType) -> bool {
    matches!(
        event_type,
        EventType::Created
            | EventType::Restored
            | EventType::Crawl
            | EventType::CrawlRestored
            | EventType::StorageClassChanged
    )
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(100u64.saturating_mul(1u64 << attempt.min(6)))
}

/// Enrich one event in place. Never fails the record: every store error is
/// absorbed, leaving the relevant fields `NULL` (which `is_accessible`
/// treats as accessible). Returns whether any field was actually
/// populated, for the `IngestSummary.enriched` counter.
pub async fn enrich_event(
    event: &mut FlatEvent,
    client: &dyn StoreClient,
    semaphore: &Semaphore,
    permission_log: &PermissionLogGate,
    tag_key_name: &str,
    max_attempts: u32,
    call_timeout: Duration,
) -> bool {
    if !should_enrich(event.event_type) {
        return false;
    }

    let Ok(_permit) = semaphore.acquire().await else { return false };
    let mut enriched = false;

    for attempt in 1..=max_attempts.max(1) {
        let call = client.head_object(&event.bucket, &event.key, event.version_id.as_deref());
        match tokio::time::timeout(call_timeout, call).await {
            Ok(Ok(Some(info))) => {
                event.storage_class = info.storage_class;
                event.archive_status = info.archive_status;
                event.e_tag = event.e_tag.clone().or(info.e_tag);
                event.size = event.size.or(info.size);
                enriched = true;
                break;
            }
            Ok(Ok(None)) => break,
            Ok(Err(TrackerError::StorePermission { bucket, .. })) => {
                if permission_log.should_log(&bucket) {
                    tracing::warn!(%bucket, key = %event.key, "permission denied enriching object; metadata stays NULL");
                }
                break;
            }
            Ok(Err(err)) if attempt < max_attempts => {
                tracing::debug!(attempt, error = %err, "transient enrichment error, retrying");
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
            Ok(Err(_)) | Err(_) => break,
        }
    }

    if let Ok(tags) = client.get_object_tagging(&event.bucket, &event.key, event.version_id.as_deref()).await {
        if let Some(raw) = tags.get(tag_key_name) {
            if let Some(lineage_id) = lineage::parse_tag_value(raw) {
                event.existing_lineage_tag = Some(lineage_id);
                enriched = true;
            }
        }
        event.tags = tags;
    }

    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use filetracker_core::model::FlatEventSource;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn sample_event(event_type: EventType) -> FlatEvent {
        FlatEvent {
            source: FlatEventSource::ObjectStore,
            event_type,
            event_time: Utc::now(),
            sequencer: Some("A".to_string()),
            bucket: "my-bucket".to_string(),
            key: "some/key.txt".to_string(),
            version_id: None,
            size: None,
            e_tag: None,
            reason: None,
            is_delete_marker: false,
            storage_class: None,
            archive_status: None,
            existing_lineage_tag: None,
            tags: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn populates_storage_class_from_head() {
        let client = MockStoreClient::new().with_object(
            "my-bucket",
            "some/key.txt",
            None,
            HeadObjectInfo { storage_class: Some(StorageClass::Glacier), ..Default::default() },
        );
        let semaphore = Semaphore::new(4);
        let gate = PermissionLogGate::new();
        let mut event = sample_event(EventType::Created);
        let enriched =
            enrich_event(&mut event, &client, &semaphore, &gate, "lineage-tag", 3, Duration::from_secs(1)).await;
        assert!(enriched);
        assert_eq!(event.storage_class, Some(StorageClass::Glacier));
    }

    #[tokio::test]
    async fn permission_denied_leaves_metadata_null() {
        let client = MockStoreClient::new().with_permission_denied("my-bucket", "some/key.txt");
        let semaphore = Semaphore::new(4);
        let gate = PermissionLogGate::new();
        let mut event = sample_event(EventType::Created);
        let enriched =
            enrich_event(&mut event, &client, &semaphore, &gate, "lineage-tag", 3, Duration::from_secs(1)).await;
        assert!(!enriched);
        assert!(event.storage_class.is_none());
    }

    #[tokio::test]
    async fn existing_lineage_tag_is_adopted() {
        let lineage_id = Uuid::new_v4();
        let mut tags = HashMap::new();
        tags.insert("lineage-tag".to_string(), lineage::format_tag_value(lineage_id));
        let client = MockStoreClient::new().with_tags("my-bucket", "some/key.txt", None, tags);
        let semaphore = Semaphore::new(4);
        let gate = PermissionLogGate::new();
        let mut event = sample_event(EventType::Created);
        enrich_event(&mut event, &client, &semaphore, &gate, "lineage-tag", 3, Duration::from_secs(1)).await;
        assert_eq!(event.existing_lineage_tag, Some(lineage_id));
    }

    #[tokio::test]
    async fn deleted_events_are_not_enriched() {
        let client = MockStoreClient::new();
        let semaphore = Semaphore::new(4);
        let gate = PermissionLogGate::new();
        let mut event = sample_event(EventType::Deleted);
        let enriched =
            enrich_event(&mut event, &client, &semaphore, &gate, "lineage-tag", 3, Duration::from_secs(1)).await;
        assert!(!enriched);
    }

    #[test]
    fn permission_log_gate_throttles_to_once_per_day() {
        let gate = PermissionLogGate::new();
        assert!(gate.should_log("my-bucket"));
        assert!(!gate.should_log("my-bucket"));
        assert!(gate.should_log("other-bucket"));
    }
}
