//! Queryable/Insertable row types, one pair per table.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::schema::{
    attribute, checksum, historical_object, object, object_attribute, pending_tag_write, s3_metadata, store_event,
};

#[derive(Debug, Clone, Queryable, Insertable, Selectable, Identifiable)]
#[diesel(table_name = store_event)]
pub struct StoreEvent {
    pub id: Uuid,
    pub event_type: String,
    pub event_time: DateTime<Utc>,
    pub sequencer: Option<String>,
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
    pub size: Option<i64>,
    pub e_tag: Option<String>,
    pub reason: Option<String>,
    pub is_delete_marker: bool,
    pub number_duplicate_events: i32,
    pub number_reordered: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Selectable, Identifiable, AsChangeset)]
#[diesel(table_name = object)]
pub struct Object {
    pub id: Uuid,
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
    pub created: DateTime<Utc>,
    pub lineage_id: Uuid,
    pub ordering: Option<String>,
    pub is_current_state: bool,
}

#[derive(Debug, Clone, Queryable, Insertable, Selectable, Identifiable)]
#[diesel(table_name = historical_object)]
pub struct HistoricalObject {
    pub id: Uuid,
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
    pub created: DateTime<Utc>,
    pub deleted: DateTime<Utc>,
    pub lineage_id: Uuid,
    pub ordering: Option<String>,
}

impl From<(Object, DateTime<Utc>)> for HistoricalObject {
    /// An `Object` is demoted to history by carrying every field across
    /// plus the `deleted` timestamp.
    fn from((object, deleted): (Object, DateTime<Utc>)) -> Self {
        HistoricalObject {
            id: object.id,
            bucket: object.bucket,
            key: object.key,
            version_id: object.version_id,
            created: object.created,
            deleted,
            lineage_id: object.lineage_id,
            ordering: object.ordering,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, Selectable, Identifiable, AsChangeset)]
#[diesel(table_name = s3_metadata)]
pub struct S3Metadata {
    pub id: Uuid,
    pub object_id: Option<Uuid>,
    pub historical_object_id: Option<Uuid>,
    pub storage_class: Option<String>,
    pub last_modified_date: Option<DateTime<Utc>>,
    pub e_tag: Option<String>,
    pub is_delete_marker: bool,
    pub expiration: Option<DateTime<Utc>>,
    pub restored: bool,
    pub archive_status: Option<String>,
    pub metadata: Value,
    pub tags: Value,
}

#[derive(Debug, Clone, Queryable, Insertable, Selectable, Identifiable)]
#[diesel(table_name = checksum)]
pub struct Checksum {
    pub id: Uuid,
    pub object_id: Option<Uuid>,
    pub historical_object_id: Option<Uuid>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Queryable, Insertable, Selectable, Identifiable)]
#[diesel(table_name = attribute)]
pub struct Attribute {
    pub id: Uuid,
    pub payload: Value,
}

#[derive(Debug, Clone, Queryable, Insertable, Selectable, Identifiable)]
#[diesel(table_name = object_attribute)]
pub struct ObjectAttribute {
    pub id: Uuid,
    pub object_id: Option<Uuid>,
    pub historical_object_id: Option<Uuid>,
    pub attribute_id: Uuid,
}

/// A lineage tag write-back that failed at ingest time, queued for a
/// later reconciliation sweep to retry.
#[derive(Debug, Clone, Queryable, Insertable, Selectable, Identifiable, AsChangeset)]
#[diesel(table_name = pending_tag_write)]
pub struct PendingTagWriteRow {
    pub id: Uuid,
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
    pub lineage_id: Uuid,
    pub existing_tags: Value,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}
