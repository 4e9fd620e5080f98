//! State Projector: recomputes `is_current_version` / `is_current_state`
//! for exactly the set of touched keys after a batch of writes, by
//! replaying each version's surviving events in sequencer order. Shared
//! by the Ingest Writer, which calls this right after persisting
//! `StoreEvent` rows for a batch.

use std::collections::HashMap;

use filetracker_core::model::EventType;

use crate::sequencer::OrderingKey;

/// One surviving `store_event` row, reduced to what the projector needs.
#[derive(Debug, Clone)]
pub struct ProjectedEvent {
    pub ordering: OrderingKey,
    pub event_type: EventType,
    pub is_delete_marker: bool,
    pub version_id: Option<String>,
}

/// Where a `(bucket, key, version_id)` sits after replaying its history.
/// `DeleteMarker` is deliberately not folded into `Gone`: it is still
/// "current" within its own partition, just disqualified from
/// `is_current_state` at the key level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionState {
    Absent,
    Live,
    DeleteMarker,
    Archived,
    Restored,
    Gone,
}

impl VersionState {
    fn is_eligible(self) -> bool {
        matches!(self, VersionState::Live | VersionState::DeleteMarker | VersionState::Archived | VersionState::Restored)
    }
}

fn apply_transition(state: VersionState, event_type: EventType, is_delete_marker: bool) -> VersionState {
    if state == VersionState::Gone {
        // Gone is terminal: a later event is still persisted to
        // store_event but cannot reopen the version.
        return state;
    }
    match event_type {
        EventType::Created | EventType::Crawl => VersionState::Live,
        EventType::CrawlRestored | EventType::Restored => VersionState::Restored,
        EventType::RestoreExpired => VersionState::Archived,
        EventType::Deleted if is_delete_marker => VersionState::DeleteMarker,
        EventType::Deleted | EventType::DeletedLifecycle => VersionState::Gone,
        EventType::StorageClassChanged | EventType::TaggingCreated | EventType::TaggingDeleted => state,
    }
}

/// The result of replaying one version's history: its final state and
/// the event at the head of its timeline (used both to break ties across
/// versions and to feed `is_accessible`'s `last_event_type` input).
#[derive(Debug, Clone)]
pub struct VersionProjection {
    pub version_id: Option<String>,
    pub state: VersionState,
    pub head: OrderingKey,
    pub head_event_type: EventType,
}

/// Replay one version's events — sorted ascending by [`OrderingKey`], so
/// the result is independent of arrival order — into its final [`VersionProjection`].
pub fn project_version(version_id: Option<String>, mut events: Vec<ProjectedEvent>) -> VersionProjection {
    events.sort_by(|a, b| a.ordering.cmp(&b.ordering));
    let mut state = VersionState::Absent;
    for event in &events {
        state = apply_transition(state, event.event_type, event.is_delete_marker);
    }
    let head = events.last().expect("project_version called with no events");
    VersionProjection { version_id, state, head: head.ordering.clone(), head_event_type: head.event_type }
}

/// Group a key's surviving events by `version_id` and project each one.
pub fn project_key(events: Vec<ProjectedEvent>) -> Vec<VersionProjection> {
    let mut by_version: HashMap<Option<String>, Vec<ProjectedEvent>> = HashMap::new();
    for event in events {
        by_version.entry(event.version_id.clone()).or_default().push(event);
    }
    by_version.into_iter().map(|(version_id, events)| project_version(version_id, events)).collect()
}

/// Pick the single current-state version for a key: the eligible version
/// with the greatest head ordering wins; if that version is a delete
/// marker, no version of the key is current.
pub fn pick_current_version(versions: &[VersionProjection]) -> Option<&VersionProjection> {
    let winner = versions.iter().filter(|v| v.state.is_eligible()).max_by(|a, b| a.head.cmp(&b.head))?;
    if winner.state == VersionState::DeleteMarker {
        None
    } else {
        Some(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn event(sequencer: &str, event_time: i64, event_type: EventType, is_delete_marker: bool) -> ProjectedEvent {
        ProjectedEvent {
            ordering: OrderingKey {
                sequencer: Some(sequencer.to_string()),
                event_time: Utc.timestamp_opt(event_time, 0).unwrap(),
                event_id: Uuid::new_v4(),
            },
            event_type,
            is_delete_marker,
            version_id: Some("v1".to_string()),
        }
    }

    #[test]
    fn create_then_overwrite_leaves_only_the_newer_version_current() {
        let v1 = project_version(Some("v1".into()), vec![event("A", 0, EventType::Created, false)]);
        let v2 = project_version(Some("v2".into()), vec![event("B", 1, EventType::Created, false)]);
        let current = pick_current_version(&[v1, v2]).unwrap();
        assert_eq!(current.version_id.as_deref(), Some("v2"));
    }

    #[test]
    fn delete_marker_head_disqualifies_the_whole_key() {
        let v1 = project_version(
            Some("v1".into()),
            vec![event("A", 0, EventType::Created, false), event("B", 1, EventType::Deleted, true)],
        );
        assert!(pick_current_version(&[v1]).is_none());
    }

    #[test]
    fn permanent_delete_is_terminal_even_if_restore_arrives_later() {
        let v1 = project_version(
            Some("v1".into()),
            vec![
                event("A", 0, EventType::Created, false),
                event("B", 1, EventType::Deleted, false),
                event("C", 2, EventType::Restored, false),
            ],
        );
        assert_eq!(v1.state, VersionState::Gone);
        assert!(pick_current_version(&[v1]).is_none());
    }

    #[test]
    fn restore_expired_demotes_to_archived_not_gone() {
        let v1 = project_version(
            Some("v1".into()),
            vec![event("A", 0, EventType::Created, false), event("B", 1, EventType::RestoreExpired, false)],
        );
        assert_eq!(v1.state, VersionState::Archived);
        assert!(pick_current_version(std::slice::from_ref(&v1)).is_some());
    }
}
