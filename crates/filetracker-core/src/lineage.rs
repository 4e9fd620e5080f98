//! Shared helpers for the lineage-tag protocol.
//!
//! A `lineage_id` is a UUID that follows a logical object across copies
//! and renames. The tag itself is just a string value on the object; this
//! module only knows how to read/write that string, not when to do so —
//! the Move Tracker in `filetracker-ingest` owns the protocol decision.

use uuid::Uuid;

pub fn format_tag_value(lineage_id: Uuid) -> String {
    lineage_id.to_string()
}

pub fn parse_tag_value(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_value_round_trips() {
        let id = Uuid::new_v4();
        assert_eq!(parse_tag_value(&format_tag_value(id)), Some(id));
    }

    #[test]
    fn malformed_tag_value_is_rejected() {
        assert_eq!(parse_tag_value("not-a-uuid"), None);
    }
}
