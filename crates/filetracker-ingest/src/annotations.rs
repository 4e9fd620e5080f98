//! Annotation Store: user-driven writes onto already-projected
//! rows — attribute patches and checksum upserts. Both are idempotent
//! and never touch history implicitly; the caller must name a history
//! row explicitly to annotate one.

use serde_json::Value;
use uuid::Uuid;

use filetracker_core::error::TrackerResult;
use filetracker_db::Repository;

/// Which row an annotation targets. Object and HistoricalObject share a
/// column pair (`object_id`/`historical_object_id`) at the storage layer,
/// but this type keeps call sites from ever setting both or neither.
#[derive(Debug, Clone, Copy)]
pub enum AnnotationTarget {
    Object(Uuid),
    Historical(Uuid),
}

impl AnnotationTarget {
    fn columns(self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            AnnotationTarget::Object(id) => (Some(id), None),
            AnnotationTarget::Historical(id) => (None, Some(id)),
        }
    }
}

/// RFC 7396 JSON Merge Patch. A `null` value removes the key; a non-object
/// patch replaces the target outright.
pub fn merge_patch(target: Value, patch: Value) -> Value {
    match (target, patch) {
        (Value::Object(mut target_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                if patch_value.is_null() {
                    target_map.remove(&key);
                } else {
                    let existing = target_map.remove(&key).unwrap_or(Value::Null);
                    target_map.insert(key, merge_patch(existing, patch_value));
                }
            }
            Value::Object(target_map)
        }
        (_, patch) => patch,
    }
}

/// The owner's attributes, folded into one JSON object by applying each
/// linked payload as a merge-patch over an empty object. Several small
/// linked attribute documents collapse into the single view a patch
/// operates against.
fn combined_view(payloads: Vec<Value>) -> Value {
    payloads.into_iter().fold(Value::Object(Default::default()), merge_patch)
}

/// Apply a user-supplied merge-patch to a target's attributes, storing
/// the result as a (possibly shared) `Attribute` row and pointing the
/// target at it exclusively. Idempotent: re-applying the same patch
/// against the resulting view is a no-op.
pub fn patch_attributes(repo: &mut Repository, target: AnnotationTarget, patch: Value) -> TrackerResult<Value> {
    let (object_id, historical_object_id) = target.columns();
    let existing = repo.attributes_for(object_id, historical_object_id)?;
    let merged = merge_patch(combined_view(existing), patch);
    let attribute_id = repo.find_or_insert_attribute(merged.clone())?;
    repo.replace_attribute_links(object_id, historical_object_id, attribute_id)?;
    Ok(merged)
}

/// Upsert a `(name, value)` checksum pair onto a target.
pub fn set_checksum(repo: &mut Repository, target: AnnotationTarget, name: &str, value: &str) -> TrackerResult<()> {
    let (object_id, historical_object_id) = target.columns();
    repo.upsert_checksum(object_id, historical_object_id, name, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_patch_replaces_scalars_and_removes_nulls() {
        let target = json!({"a": 1, "b": {"c": 2, "d": 3}});
        let patch = json!({"a": 2, "b": {"c": null}});
        let result = merge_patch(target, patch);
        assert_eq!(result, json!({"a": 2, "b": {"d": 3}}));
    }

    #[test]
    fn merge_patch_on_non_object_target_replaces_outright() {
        let result = merge_patch(json!("scalar"), json!({"a": 1}));
        assert_eq!(result, json!({"a": 1}));
    }

    #[test]
    fn combined_view_folds_multiple_payloads_in_order() {
        let view = combined_view(vec![json!({"project": "genomics"}), json!({"owner": "alice"})]);
        assert_eq!(view, json!({"project": "genomics", "owner": "alice"}));
    }

    #[test]
    fn reapplying_the_same_patch_against_its_own_result_is_idempotent() {
        let base = json!({"project": "genomics"});
        let patch = json!({"owner": "alice"});
        let once = merge_patch(base, patch.clone());
        let twice = merge_patch(once.clone(), patch);
        assert_eq!(once, twice);
    }
}
