//! Active classifier selection

use crate::registry::{ClassifierRecord, RegistrySnapshot};

/// Pick the classifier that should serve requests right now
///
/// The newest `Available` record wins; on equal creation times the record
/// listed first wins. Returns `None` when nothing is `Available`, in which
/// case the caller keeps its previous selection.
pub fn select_active(snapshot: &RegistrySnapshot) -> Option<&ClassifierRecord> {
    let mut best: Option<&ClassifierRecord> = None;

    for record in snapshot.records().iter().filter(|r| r.is_available()) {
        match best {
            Some(current) if record.created_at <= current.created_at => {}
            _ => best = Some(record),
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClassifierStatus::{Available, Failed, Training, Unavailable};

    const FAMILY: &str = "self_nlc.csv";

    fn snapshot(records: Vec<ClassifierRecord>) -> RegistrySnapshot {
        RegistrySnapshot::new(FAMILY, records)
    }

    fn selected_id(snapshot: &RegistrySnapshot) -> Option<&str> {
        select_active(snapshot).map(|r| r.id.as_str())
    }

    #[test]
    fn test_single_available_is_selected() {
        let s = snapshot(vec![ClassifierRecord::new("a", 100, Available, FAMILY)]);
        assert_eq!(selected_id(&s), Some("a"));
    }

    #[test]
    fn test_newest_available_wins() {
        let s = snapshot(vec![
            ClassifierRecord::new("a", 100, Available, FAMILY),
            ClassifierRecord::new("b", 160, Available, FAMILY),
        ]);
        assert_eq!(selected_id(&s), Some("b"));
    }

    #[test]
    fn test_newer_non_available_records_are_ignored() {
        let s = snapshot(vec![
            ClassifierRecord::new("a", 100, Available, FAMILY),
            ClassifierRecord::new("b", 160, Training, FAMILY),
            ClassifierRecord::new("c", 170, Failed, FAMILY),
            ClassifierRecord::new("d", 180, Unavailable, FAMILY),
        ]);
        assert_eq!(selected_id(&s), Some("a"));
    }

    #[test]
    fn test_tie_goes_to_first_listed() {
        let s = snapshot(vec![
            ClassifierRecord::new("first", 100, Available, FAMILY),
            ClassifierRecord::new("second", 100, Available, FAMILY),
        ]);
        assert_eq!(selected_id(&s), Some("first"));
    }

    #[test]
    fn test_empty_and_all_unavailable_select_none() {
        assert_eq!(selected_id(&snapshot(vec![])), None);

        let s = snapshot(vec![ClassifierRecord::new("b", 160, Training, FAMILY)]);
        assert_eq!(selected_id(&s), None);
    }

    #[test]
    fn test_unparsable_time_loses_to_any_known_time() {
        let s = snapshot(vec![
            ClassifierRecord::from_service("garbled", "not a time", "Available", FAMILY),
            ClassifierRecord::new("a", 1, Available, FAMILY),
        ]);
        assert_eq!(selected_id(&s), Some("a"));
    }

    #[test]
    fn test_unparsable_time_still_selectable_when_alone() {
        let s = snapshot(vec![ClassifierRecord::from_service(
            "garbled",
            "not a time",
            "Available",
            FAMILY,
        )]);
        assert_eq!(selected_id(&s), Some("garbled"));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let s = snapshot(vec![
            ClassifierRecord::new("a", 100, Available, FAMILY),
            ClassifierRecord::new("b", 160, Available, FAMILY),
            ClassifierRecord::new("c", 160, Available, FAMILY),
        ]);
        let first = selected_id(&s);
        for _ in 0..10 {
            assert_eq!(selected_id(&s), first);
        }
        assert_eq!(first, Some("b"));
    }
}
