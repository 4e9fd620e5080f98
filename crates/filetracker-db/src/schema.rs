// Hand-written schema, checked in rather than generated at build time.

diesel::table! {
    use diesel::sql_types::*;

    store_event (id) {
        id -> Uuid,
        event_type -> Text,
        event_time -> Timestamptz,
        sequencer -> Nullable<Text>,
        bucket -> Text,
        key -> Text,
        version_id -> Nullable<Text>,
        size -> Nullable<Int8>,
        e_tag -> Nullable<Text>,
        reason -> Nullable<Text>,
        is_delete_marker -> Bool,
        number_duplicate_events -> Int4,
        number_reordered -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    object (id) {
        id -> Uuid,
        bucket -> Text,
        key -> Text,
        version_id -> Nullable<Text>,
        created -> Timestamptz,
        lineage_id -> Uuid,
        ordering -> Nullable<Text>,
        is_current_state -> Bool,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    historical_object (id) {
        id -> Uuid,
        bucket -> Text,
        key -> Text,
        version_id -> Nullable<Text>,
        created -> Timestamptz,
        deleted -> Timestamptz,
        lineage_id -> Uuid,
        ordering -> Nullable<Text>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    s3_metadata (id) {
        id -> Uuid,
        object_id -> Nullable<Uuid>,
        historical_object_id -> Nullable<Uuid>,
        storage_class -> Nullable<Text>,
        last_modified_date -> Nullable<Timestamptz>,
        e_tag -> Nullable<Text>,
        is_delete_marker -> Bool,
        expiration -> Nullable<Timestamptz>,
        restored -> Bool,
        archive_status -> Nullable<Text>,
        metadata -> Jsonb,
        tags -> Jsonb,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    checksum (id) {
        id -> Uuid,
        object_id -> Nullable<Uuid>,
        historical_object_id -> Nullable<Uuid>,
        name -> Text,
        value -> Text,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    attribute (id) {
        id -> Uuid,
        payload -> Jsonb,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    object_attribute (id) {
        id -> Uuid,
        object_id -> Nullable<Uuid>,
        historical_object_id -> Nullable<Uuid>,
        attribute_id -> Uuid,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    pending_tag_write (id) {
        id -> Uuid,
        bucket -> Text,
        key -> Text,
        version_id -> Nullable<Text>,
        lineage_id -> Uuid,
        existing_tags -> Jsonb,
        attempts -> Int4,
        last_error -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(s3_metadata -> object (object_id));
diesel::joinable!(checksum -> object (object_id));
diesel::joinable!(object_attribute -> object (object_id));
diesel::joinable!(object_attribute -> attribute (attribute_id));

diesel::allow_tables_to_appear_in_same_query!(
    store_event,
    object,
    historical_object,
    s3_metadata,
    checksum,
    attribute,
    object_attribute,
    pending_tag_write,
);
