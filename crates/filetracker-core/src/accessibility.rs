//! The `is_accessible` computed column, factored out as a pure function
//! so both the Ingest Writer and the State Projector derive it
//! identically: a pure function of
//! `(is_current_state, storage_class, reason, archive_status)`.

use crate::model::{ArchiveStatus, EventType, StorageClass};

/// "reason" here is really "was the most recent event a restore", which
/// is exactly what `EventType::Restored` / `EventType::CrawlRestored`
/// already encode — passing the event type avoids a second,
/// string-keyed notion of "reason" alongside the enum.
pub fn is_accessible(
    is_current_state: bool,
    storage_class: Option<StorageClass>,
    last_event_type: EventType,
    archive_status: Option<ArchiveStatus>,
) -> bool {
    if !is_current_state {
        return false;
    }
    let Some(storage_class) = storage_class else {
        return true;
    };
    if storage_class == StorageClass::Glacier {
        return false;
    }
    if storage_class == StorageClass::DeepArchive
        && !matches!(last_event_type, EventType::Restored | EventType::CrawlRestored)
    {
        return false;
    }
    if storage_class == StorageClass::IntelligentTiering && archive_status.is_some() {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_current_state_is_never_accessible() {
        assert!(!is_accessible(false, None, EventType::Created, None));
    }

    #[test]
    fn unknown_storage_class_is_accessible() {
        assert!(is_accessible(true, None, EventType::Created, None));
    }

    #[test]
    fn glacier_is_never_accessible() {
        assert!(!is_accessible(true, Some(StorageClass::Glacier), EventType::Created, None));
    }

    #[test]
    fn deep_archive_is_accessible_only_just_after_a_restore() {
        assert!(!is_accessible(true, Some(StorageClass::DeepArchive), EventType::Created, None));
        assert!(is_accessible(true, Some(StorageClass::DeepArchive), EventType::Restored, None));
        assert!(is_accessible(true, Some(StorageClass::DeepArchive), EventType::CrawlRestored, None));
    }

    #[test]
    fn intelligent_tiering_is_accessible_only_without_an_archive_status() {
        assert!(is_accessible(true, Some(StorageClass::IntelligentTiering), EventType::Created, None));
        assert!(!is_accessible(
            true,
            Some(StorageClass::IntelligentTiering),
            EventType::Created,
            Some(ArchiveStatus::ArchiveAccess)
        ));
    }
}
