//! Sequencer / Deduplicator.
//!
//! Pure, DB-free ordering logic: given two candidate events for the same
//! `(bucket, key, version_id)`, which one is "later"? Kept separate from
//! the repository so the total order — and its NULL-sorts-last quirk —
//! has one implementation that both the Ingest Writer and the State
//! Projector share, and that property tests can exercise without a
//! database.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use uuid::Uuid;

/// The total order over events touching one `(bucket, key, version_id)`:
/// sequencer ascending with `None` sorted last, tie-broken by `event_time`
/// ascending, then `event_id` ascending. The *maximum* element under this
/// order is the "latest" / "head" event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingKey {
    pub sequencer: Option<String>,
    pub event_time: DateTime<Utc>,
    pub event_id: Uuid,
}

impl PartialOrd for OrderingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let sequencer_order = match (&self.sequencer, &other.sequencer) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        };
        sequencer_order
            .then_with(|| self.event_time.cmp(&other.event_time))
            .then_with(|| self.event_id.cmp(&other.event_id))
    }
}

/// Is `candidate` strictly older than `current_latest`? Used to decide
/// whether an arriving event should bump the `number_reordered` counter
/// on itself without disturbing current-state, which already reflects
/// the true latest event.
pub fn arrived_out_of_order(candidate: &OrderingKey, current_latest: &OrderingKey) -> bool {
    candidate < current_latest
}

/// The maximum (latest) key among a set of candidates, or `None` if empty.
pub fn latest<'a>(keys: impl IntoIterator<Item = &'a OrderingKey>) -> Option<&'a OrderingKey> {
    keys.into_iter().max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(sequencer: Option<&str>, event_time: i64, event_id: u128) -> OrderingKey {
        OrderingKey {
            sequencer: sequencer.map(str::to_string),
            event_time: Utc.timestamp_opt(event_time, 0).unwrap(),
            event_id: Uuid::from_u128(event_id),
        }
    }

    #[test]
    fn null_sequencer_sorts_after_any_real_sequencer() {
        let real = key(Some("0055AED6DCD90281E5"), 100, 1);
        let null = key(None, 0, 2);
        assert!(null > real, "a NULL sequencer must be treated as latest-known");
    }

    #[test]
    fn real_sequencers_compare_lexicographically() {
        let a = key(Some("AAA"), 0, 1);
        let b = key(Some("AAB"), 0, 2);
        assert!(b > a);
    }

    #[test]
    fn ties_break_on_event_time_then_event_id() {
        let earlier = key(None, 100, 5);
        let later = key(None, 200, 1);
        assert!(later > earlier);

        let lower_id = key(None, 100, 1);
        let higher_id = key(None, 100, 2);
        assert!(higher_id > lower_id);
    }

    #[test]
    fn out_of_order_detection_matches_a_reordered_arrival() {
        // Created(seq=B) arrives first, then Created(seq=A<B).
        let b = key(Some("B"), 10, 1);
        let a = key(Some("A"), 20, 2);
        assert!(arrived_out_of_order(&a, &b));
        assert!(!arrived_out_of_order(&b, &a));
    }

    #[test]
    fn latest_picks_the_maximum_under_the_total_order() {
        let keys = vec![key(Some("A"), 0, 1), key(Some("C"), 0, 2), key(Some("B"), 0, 3)];
        assert_eq!(latest(&keys).unwrap().sequencer.as_deref(), Some("C"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn arb_key() -> impl Strategy<Value = OrderingKey> {
        (
            proptest::option::of("[A-Z]{1,8}"),
            0i64..1_000_000,
            any::<u128>(),
        )
            .prop_map(|(sequencer, seconds, id_bits)| OrderingKey {
                sequencer,
                event_time: Utc.timestamp_opt(seconds, 0).unwrap(),
                event_id: Uuid::from_u128(id_bits),
            })
    }

    proptest! {
        /// Total order: exactly one of <, ==, > holds for any pair, and it
        /// agrees with itself when the operands are swapped.
        #[test]
        fn ordering_is_antisymmetric(a in arb_key(), b in arb_key()) {
            let forward = a.cmp(&b);
            let backward = b.cmp(&a);
            prop_assert_eq!(forward, backward.reverse());
        }

        /// A NULL sequencer never loses to a real one, regardless of the
        /// other fields.
        #[test]
        fn null_sequencer_never_loses_to_a_real_one(
            real_seq in "[A-Z]{1,8}",
            a in arb_key(),
            b in arb_key(),
        ) {
            let with_null = OrderingKey { sequencer: None, ..a };
            let with_real = OrderingKey { sequencer: Some(real_seq), ..b };
            prop_assert!(with_null >= with_real);
        }

        /// `arrived_out_of_order` and `<` agree by definition; this guards
        /// against a future refactor decoupling the two.
        #[test]
        fn arrived_out_of_order_matches_strict_less_than(a in arb_key(), b in arb_key()) {
            prop_assert_eq!(arrived_out_of_order(&a, &b), a < b);
        }

        /// `latest` over a non-empty set always returns the maximum under
        /// `Ord`, independent of input order.
        #[test]
        fn latest_is_order_independent(mut keys in proptest::collection::vec(arb_key(), 1..20)) {
            let expected = keys.iter().max().cloned();
            keys.reverse();
            prop_assert_eq!(latest(&keys).cloned(), expected);
        }
    }
}
