// src/policy/ordering.rs
//! Default ordering policy: priority, then deadline, then id

use crate::policy::OrderingPolicy;
use crate::work_item::WorkItem;
use std::cmp::Ordering;

/// Higher priority first; on tie, earlier deadline first with missing
/// deadlines last; on further tie, lexicographic id for a stable total
/// order (deterministic, not FIFO by arrival).
#[derive(Debug, Clone, Copy)]
pub struct PriorityOrderingPolicy;

impl OrderingPolicy for PriorityOrderingPolicy {
    fn compare(&self, a: &WorkItem, b: &WorkItem) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| compare_deadline(a, b))
            .then_with(|| a.id.cmp(&b.id))
    }
}

fn compare_deadline(a: &WorkItem, b: &WorkItem) -> Ordering {
    match (a.deadline, b.deadline) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(da), Some(db)) => da.cmp(&db),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_item::WorkItemKind;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    fn item(id: &str, priority: i32) -> WorkItem {
        WorkItem::new("a", "e", WorkItemKind::Job)
            .with_id(id)
            .with_priority(priority)
    }

    #[test]
    fn test_higher_priority_first() {
        let policy = PriorityOrderingPolicy;
        let low = item("x", 0);
        let high = item("y", 10);
        assert_eq!(policy.compare(&high, &low), Ordering::Less);
        assert_eq!(policy.compare(&low, &high), Ordering::Greater);
    }

    #[test]
    fn test_earlier_deadline_breaks_tie() {
        let policy = PriorityOrderingPolicy;
        let now = Utc::now();
        let soon = item("x", 5).with_deadline(now + Duration::seconds(1));
        let later = item("y", 5).with_deadline(now + Duration::seconds(60));
        assert_eq!(policy.compare(&soon, &later), Ordering::Less);
    }

    #[test]
    fn test_missing_deadline_sorts_last() {
        let policy = PriorityOrderingPolicy;
        let with = item("x", 5).with_deadline(Utc::now() + Duration::seconds(60));
        let without = item("y", 5);
        assert_eq!(policy.compare(&with, &without), Ordering::Less);
        assert_eq!(policy.compare(&without, &with), Ordering::Greater);
    }

    #[test]
    fn test_id_breaks_final_tie() {
        let policy = PriorityOrderingPolicy;
        let a = item("aaa", 5);
        let b = item("bbb", 5);
        assert_eq!(policy.compare(&a, &b), Ordering::Less);
        assert_eq!(policy.compare(&a, &a.clone()), Ordering::Equal);
    }

    proptest! {
        // comparator must be a valid total order: antisymmetric and transitive
        #[test]
        fn prop_antisymmetric(p1 in -100i32..100, p2 in -100i32..100,
                              id1 in "[a-z]{1,8}", id2 in "[a-z]{1,8}") {
            let policy = PriorityOrderingPolicy;
            let a = item(&id1, p1);
            let b = item(&id2, p2);
            prop_assert_eq!(policy.compare(&a, &b), policy.compare(&b, &a).reverse());
        }

        #[test]
        fn prop_transitive(ps in proptest::collection::vec((-10i32..10, "[a-z]{1,4}"), 3)) {
            let policy = PriorityOrderingPolicy;
            let items: Vec<WorkItem> = ps.iter().map(|(p, id)| item(id, *p)).collect();
            let (a, b, c) = (&items[0], &items[1], &items[2]);
            if policy.compare(a, b) != Ordering::Greater
                && policy.compare(b, c) != Ordering::Greater
            {
                prop_assert_ne!(policy.compare(a, c), Ordering::Greater);
            }
        }
    }
}
