//! Transaction-scoped persistence primitives: a thin wrapper around a
//! connection that knows how to write one kind of row. The higher-level
//! state machine and projector logic live in `filetracker-ingest` and
//! call these primitives inside one transaction per batch.

use chrono::{DateTime, Utc};
use diesel::pg::PgExpressionMethods;
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use filetracker_core::error::TrackerResult;

use crate::models::{
    Attribute, Checksum, HistoricalObject, Object, ObjectAttribute, PendingTagWriteRow, S3Metadata, StoreEvent,
};
use crate::schema::{
    attribute, checksum, historical_object, object, object_attribute, pending_tag_write, s3_metadata, store_event,
};

/// Fields needed to persist a new `StoreEvent`; `id`/`created_at` and the
/// duplicate/reorder counters are assigned by the repository, not the
/// caller.
#[derive(Debug, Clone)]
pub struct NewStoreEvent {
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
}

pub struct Repository<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> Repository<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert a `StoreEvent`, or increment `number_duplicate_events` on an
    /// existing row matching the dedup key. Returns the persisted row and
    /// whether this call was a duplicate.
    pub fn insert_or_bump_duplicate(&mut self, new_event: NewStoreEvent) -> TrackerResult<(StoreEvent, bool)> {
        use store_event::dsl;

        let existing = store_event::table
            .filter(dsl::bucket.eq(&new_event.bucket))
            .filter(dsl::key.eq(&new_event.key))
            .filter(dsl::version_id.is_not_distinct_from(&new_event.version_id))
            .filter(dsl::sequencer.is_not_distinct_from(&new_event.sequencer))
            .filter(dsl::event_type.eq(&new_event.event_type))
            .first::<StoreEvent>(self.conn)
            .optional()?;

        if let Some(row) = existing {
            let updated = diesel::update(store_event::table.find(row.id))
                .set(dsl::number_duplicate_events.eq(dsl::number_duplicate_events + 1))
                .get_result::<StoreEvent>(self.conn)?;
            return Ok((updated, true));
        }

        let row = StoreEvent {
            id: Uuid::new_v4(),
            event_type: new_event.event_type,
            event_time: new_event.event_time,
            sequencer: new_event.sequencer,
            bucket: new_event.bucket,
            key: new_event.key,
            version_id: new_event.version_id,
            size: new_event.size,
            e_tag: new_event.e_tag,
            reason: new_event.reason,
            is_delete_marker: new_event.is_delete_marker,
            number_duplicate_events: 0,
            number_reordered: 0,
            created_at: Utc::now(),
        };
        diesel::insert_into(store_event::table).values(&row).execute(self.conn)?;
        Ok((row, false))
    }

    pub fn bump_reordered(&mut self, event_id: Uuid) -> TrackerResult<()> {
        use store_event::dsl;
        diesel::update(store_event::table.find(event_id))
            .set(dsl::number_reordered.eq(dsl::number_reordered + 1))
            .execute(self.conn)?;
        Ok(())
    }

    /// All persisted events for a restricted set of `(bucket, key)` pairs,
    /// used by the State Projector to recompute exactly the touched keys.
    /// Ordering resolution (sequencer, NULL-last) happens in
    /// `filetracker-ingest`'s in-memory comparator rather than in SQL —
    /// this keeps the index-backed fetch dialect-agnostic and the total
    /// order (which treats NULL as "latest") in one place, already
    /// covered by property tests.
    pub fn events_for_keys(&mut self, keys: &[(String, String)]) -> TrackerResult<Vec<StoreEvent>> {
        use store_event::dsl;

        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = store_event::table.into_boxed();
        let mut first = true;
        for (bucket, key) in keys {
            let clause = dsl::bucket.eq(bucket.clone()).and(dsl::key.eq(key.clone()));
            query = if first {
                query.filter(clause)
            } else {
                query.or_filter(clause)
            };
            first = false;
        }
        Ok(query.load::<StoreEvent>(self.conn)?)
    }

    pub fn find_object_by_version(
        &mut self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> TrackerResult<Option<Object>> {
        use object::dsl;
        Ok(object::table
            .filter(dsl::bucket.eq(bucket))
            .filter(dsl::key.eq(key))
            .filter(dsl::version_id.is_not_distinct_from(version_id))
            .first::<Object>(self.conn)
            .optional()?)
    }

    pub fn objects_for_key(&mut self, bucket: &str, key: &str) -> TrackerResult<Vec<Object>> {
        use object::dsl;
        Ok(object::table
            .filter(dsl::bucket.eq(bucket))
            .filter(dsl::key.eq(key))
            .load::<Object>(self.conn)?)
    }

    pub fn insert_object(&mut self, row: &Object) -> TrackerResult<()> {
        diesel::insert_into(object::table).values(row).execute(self.conn)?;
        Ok(())
    }

    pub fn update_object(&mut self, row: &Object) -> TrackerResult<()> {
        diesel::update(object::table.find(row.id)).set(row).execute(self.conn)?;
        Ok(())
    }

    pub fn set_current_state(&mut self, object_id: Uuid, is_current: bool) -> TrackerResult<()> {
        use object::dsl;
        diesel::update(object::table.find(object_id))
            .set(dsl::is_current_state.eq(is_current))
            .execute(self.conn)?;
        Ok(())
    }

    /// Demote a live `Object` to `HistoricalObject`, transferring
    /// ownership of its metadata, checksums, and attribute links. The
    /// historical row reuses the object's id so child rows only need
    /// their owning FK column flipped, never rewritten.
    pub fn demote_to_history(&mut self, row: Object, deleted: DateTime<Utc>) -> TrackerResult<HistoricalObject> {
        let historical: HistoricalObject = (row.clone(), deleted).into();
        diesel::insert_into(historical_object::table)
            .values(&historical)
            .execute(self.conn)?;

        {
            use s3_metadata::dsl;
            diesel::update(s3_metadata::table.filter(dsl::object_id.eq(row.id)))
                .set((dsl::object_id.eq(None::<Uuid>), dsl::historical_object_id.eq(Some(row.id))))
                .execute(self.conn)?;
        }
        {
            use checksum::dsl;
            diesel::update(checksum::table.filter(dsl::object_id.eq(row.id)))
                .set((dsl::object_id.eq(None::<Uuid>), dsl::historical_object_id.eq(Some(row.id))))
                .execute(self.conn)?;
        }
        {
            use object_attribute::dsl;
            diesel::update(object_attribute::table.filter(dsl::object_id.eq(row.id)))
                .set((dsl::object_id.eq(None::<Uuid>), dsl::historical_object_id.eq(Some(row.id))))
                .execute(self.conn)?;
        }

        diesel::delete(object::table.find(row.id)).execute(self.conn)?;
        Ok(historical)
    }

    pub fn metadata_for_object(&mut self, object_id: Uuid) -> TrackerResult<Option<S3Metadata>> {
        use s3_metadata::dsl;
        Ok(s3_metadata::table
            .filter(dsl::object_id.eq(object_id))
            .first::<S3Metadata>(self.conn)
            .optional()?)
    }

    pub fn upsert_metadata_for_object(&mut self, object_id: Uuid, mut row: S3Metadata) -> TrackerResult<()> {
        row.object_id = Some(object_id);
        row.historical_object_id = None;
        if let Some(existing) = self.metadata_for_object(object_id)? {
            row.id = existing.id;
            diesel::update(s3_metadata::table.find(existing.id)).set(&row).execute(self.conn)?;
        } else {
            diesel::insert_into(s3_metadata::table).values(&row).execute(self.conn)?;
        }
        Ok(())
    }

    /// History is append-only: a historical row's metadata is written
    /// exactly once, at demotion time, never upserted afterward.
    pub fn insert_metadata_for_historical(&mut self, row: S3Metadata) -> TrackerResult<()> {
        diesel::insert_into(s3_metadata::table).values(&row).execute(self.conn)?;
        Ok(())
    }

    pub fn upsert_checksum(
        &mut self,
        object_id: Option<Uuid>,
        historical_object_id: Option<Uuid>,
        name: &str,
        value: &str,
    ) -> TrackerResult<()> {
        use checksum::dsl;
        let existing = checksum::table
            .filter(dsl::object_id.is_not_distinct_from(object_id))
            .filter(dsl::historical_object_id.is_not_distinct_from(historical_object_id))
            .filter(dsl::name.eq(name))
            .first::<Checksum>(self.conn)
            .optional()?;

        match existing {
            Some(row) if row.value == value => Ok(()),
            Some(row) => {
                diesel::update(checksum::table.find(row.id))
                    .set(dsl::value.eq(value))
                    .execute(self.conn)?;
                Ok(())
            }
            None => {
                let row = Checksum {
                    id: Uuid::new_v4(),
                    object_id,
                    historical_object_id,
                    name: name.to_string(),
                    value: value.to_string(),
                };
                diesel::insert_into(checksum::table).values(&row).execute(self.conn)?;
                Ok(())
            }
        }
    }

    /// Find an existing `Attribute` row with an identical payload, or
    /// insert a new one. Identical payloads are shared across objects.
    pub fn find_or_insert_attribute(&mut self, payload: Value) -> TrackerResult<Uuid> {
        use attribute::dsl;
        let existing = attribute::table
            .filter(dsl::payload.eq(&payload))
            .first::<Attribute>(self.conn)
            .optional()?;
        if let Some(row) = existing {
            return Ok(row.id);
        }
        let row = Attribute { id: Uuid::new_v4(), payload };
        diesel::insert_into(attribute::table).values(&row).execute(self.conn)?;
        Ok(row.id)
    }

    pub fn link_attribute(
        &mut self,
        object_id: Option<Uuid>,
        historical_object_id: Option<Uuid>,
        attribute_id: Uuid,
    ) -> TrackerResult<()> {
        use object_attribute::dsl;
        let already_linked = object_attribute::table
            .filter(dsl::object_id.is_not_distinct_from(object_id))
            .filter(dsl::historical_object_id.is_not_distinct_from(historical_object_id))
            .filter(dsl::attribute_id.eq(attribute_id))
            .first::<ObjectAttribute>(self.conn)
            .optional()?;
        if already_linked.is_some() {
            return Ok(());
        }
        let row = ObjectAttribute { id: Uuid::new_v4(), object_id, historical_object_id, attribute_id };
        diesel::insert_into(object_attribute::table).values(&row).execute(self.conn)?;
        Ok(())
    }

    /// Point an owner at exactly one `Attribute` row, dropping any other
    /// links it held. Used by the Annotation Store, which folds all of an
    /// owner's attribute payloads into a single merge-patched result on
    /// every patch call.
    pub fn replace_attribute_links(
        &mut self,
        object_id: Option<Uuid>,
        historical_object_id: Option<Uuid>,
        attribute_id: Uuid,
    ) -> TrackerResult<()> {
        use object_attribute::dsl;
        diesel::delete(
            object_attribute::table
                .filter(dsl::object_id.is_not_distinct_from(object_id))
                .filter(dsl::historical_object_id.is_not_distinct_from(historical_object_id)),
        )
        .execute(self.conn)?;
        self.link_attribute(object_id, historical_object_id, attribute_id)
    }

    pub fn attributes_for(
        &mut self,
        object_id: Option<Uuid>,
        historical_object_id: Option<Uuid>,
    ) -> TrackerResult<Vec<Value>> {
        use object_attribute::dsl as oa;
        let attribute_ids: Vec<Uuid> = object_attribute::table
            .filter(oa::object_id.is_not_distinct_from(object_id))
            .filter(oa::historical_object_id.is_not_distinct_from(historical_object_id))
            .select(oa::attribute_id)
            .load(self.conn)?;
        if attribute_ids.is_empty() {
            return Ok(Vec::new());
        }
        use attribute::dsl as a;
        Ok(attribute::table.filter(a::id.eq_any(attribute_ids)).select(a::payload).load(self.conn)?)
    }

    /// Queue a failed lineage tag write-back for a later reconciliation
    /// sweep to retry.
    pub fn insert_pending_tag_write(&mut self, row: &PendingTagWriteRow) -> TrackerResult<()> {
        diesel::insert_into(pending_tag_write::table).values(row).execute(self.conn)?;
        Ok(())
    }

    /// The oldest `limit` queued tag writes, for a sweep to drain.
    pub fn due_pending_tag_writes(&mut self, limit: i64) -> TrackerResult<Vec<PendingTagWriteRow>> {
        use pending_tag_write::dsl;
        Ok(pending_tag_write::table
            .order(dsl::created_at.asc())
            .limit(limit)
            .load::<PendingTagWriteRow>(self.conn)?)
    }

    pub fn delete_pending_tag_write(&mut self, id: Uuid) -> TrackerResult<()> {
        diesel::delete(pending_tag_write::table.find(id)).execute(self.conn)?;
        Ok(())
    }

    /// Record a retry attempt that failed again, keeping the row for the
    /// next sweep rather than deleting it.
    pub fn bump_pending_tag_write_attempt(&mut self, id: Uuid, error: &str) -> TrackerResult<()> {
        use pending_tag_write::dsl;
        diesel::update(pending_tag_write::table.find(id))
            .set((dsl::attempts.eq(dsl::attempts + 1), dsl::last_error.eq(error)))
            .execute(self.conn)?;
        Ok(())
    }
}
