//! Purge of superseded classifiers

use crate::registry::RegistrySnapshot;

/// Ids of classifiers that are safe to delete
///
/// The reference time is the creation time of the active classifier. A record
/// is a candidate only when it is strictly older than the reference and the
/// gap exceeds `grace_window_secs` (a gap equal to the window is kept).
/// Records with unparsable times are older than any known reference.
///
/// Nothing is purged when there is no active selection, when the active id is
/// missing from the snapshot, or when its own creation time is unknown. The
/// active id itself is never returned. Results follow snapshot order.
pub fn purge_candidates(
    snapshot: &RegistrySnapshot,
    active_id: Option<&str>,
    grace_window_secs: i64,
) -> Vec<String> {
    let Some(active_id) = active_id else {
        return Vec::new();
    };
    let Some(reference) = snapshot.get(active_id).and_then(|r| r.created_at) else {
        return Vec::new();
    };
    let grace = grace_window_secs.max(0);

    snapshot
        .records()
        .iter()
        .filter(|r| r.id != active_id)
        .filter(|r| match r.created_at {
            None => true,
            Some(created) => created < reference && reference.saturating_sub(created) > grace,
        })
        .map(|r| r.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClassifierRecord;
    use crate::registry::ClassifierStatus::{Available, Failed, Training};

    const FAMILY: &str = "self_nlc.csv";

    fn a_and_b() -> RegistrySnapshot {
        RegistrySnapshot::new(
            FAMILY,
            vec![
                ClassifierRecord::new("a", 100, Available, FAMILY),
                ClassifierRecord::new("b", 160, Available, FAMILY),
            ],
        )
    }

    #[test]
    fn test_within_grace_window_is_kept() {
        assert!(purge_candidates(&a_and_b(), Some("b"), 300).is_empty());
    }

    #[test]
    fn test_beyond_grace_window_is_purged() {
        assert_eq!(purge_candidates(&a_and_b(), Some("b"), 30), vec!["a".to_string()]);
    }

    #[test]
    fn test_grace_boundary_is_exclusive() {
        // delta == 60
        assert!(purge_candidates(&a_and_b(), Some("b"), 60).is_empty());
        assert_eq!(purge_candidates(&a_and_b(), Some("b"), 59), vec!["a".to_string()]);
    }

    #[test]
    fn test_no_active_selection_purges_nothing() {
        assert!(purge_candidates(&a_and_b(), None, 0).is_empty());
    }

    #[test]
    fn test_active_missing_from_snapshot_purges_nothing() {
        assert!(purge_candidates(&a_and_b(), Some("gone"), 0).is_empty());
    }

    #[test]
    fn test_active_is_never_a_candidate() {
        let s = a_and_b();
        for grace in [0, 1, 30, 300, i64::MAX] {
            for active in ["a", "b"] {
                assert!(!purge_candidates(&s, Some(active), grace).contains(&active.to_string()));
            }
        }
    }

    #[test]
    fn test_newer_records_are_never_purged_even_if_failed() {
        let s = RegistrySnapshot::new(
            FAMILY,
            vec![
                ClassifierRecord::new("a", 100, Available, FAMILY),
                ClassifierRecord::new("b", 5_000, Failed, FAMILY),
                ClassifierRecord::new("c", 9_000, Training, FAMILY),
            ],
        );
        assert!(purge_candidates(&s, Some("a"), 0).is_empty());
    }

    #[test]
    fn test_unparsable_record_is_purged_once_superseded() {
        let s = RegistrySnapshot::new(
            FAMILY,
            vec![
                ClassifierRecord::from_service("garbled", "2016-13-01T00:00:00", "Failed", FAMILY),
                ClassifierRecord::new("b", 160, Available, FAMILY),
            ],
        );
        assert_eq!(purge_candidates(&s, Some("b"), 300), vec!["garbled".to_string()]);
    }

    #[test]
    fn test_unknown_reference_time_purges_nothing() {
        let s = RegistrySnapshot::new(
            FAMILY,
            vec![
                ClassifierRecord::new("a", 100, Failed, FAMILY),
                ClassifierRecord::from_service("active", "garbage", "Available", FAMILY),
            ],
        );
        assert!(purge_candidates(&s, Some("active"), 0).is_empty());
    }

    #[test]
    fn test_negative_grace_is_treated_as_zero() {
        let s = RegistrySnapshot::new(
            FAMILY,
            vec![
                ClassifierRecord::new("same", 160, Failed, FAMILY),
                ClassifierRecord::new("b", 160, Available, FAMILY),
            ],
        );
        // Equal creation time is not "older"
        assert!(purge_candidates(&s, Some("b"), -10).is_empty());
    }

    #[test]
    fn test_candidates_follow_snapshot_order() {
        let s = RegistrySnapshot::new(
            FAMILY,
            vec![
                ClassifierRecord::new("z", 10, Failed, FAMILY),
                ClassifierRecord::new("b", 1_000, Available, FAMILY),
                ClassifierRecord::new("a", 20, Available, FAMILY),
            ],
        );
        assert_eq!(
            purge_candidates(&s, Some("b"), 300),
            vec!["z".to_string(), "a".to_string()]
        );
    }
}
