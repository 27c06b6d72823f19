//! Training trigger

use crate::registry::RegistrySnapshot;
use nlcm_common::time::EpochSeconds;

/// Creation time of the newest record of any status
///
/// Empty snapshots and unparsable times count as the epoch.
pub fn newest_created_at(snapshot: &RegistrySnapshot) -> EpochSeconds {
    snapshot
        .records()
        .iter()
        .map(|r| r.created_at.unwrap_or(0))
        .max()
        .unwrap_or(0)
}

/// True when the snapshot has records but none with a parsable creation time
///
/// Such a snapshot says nothing about how old the classifiers are.
pub fn creation_times_unknown(snapshot: &RegistrySnapshot) -> bool {
    !snapshot.is_empty() && snapshot.records().iter().all(|r| r.created_at.is_none())
}

/// Whether the corpus changed after the newest classifier was requested
///
/// Training, failed and available records all count: a classifier already in
/// flight for the current corpus must not be duplicated. Only call this with a
/// snapshot that was actually fetched; a failed fetch is not "nothing newer".
/// Likewise a snapshot whose creation times are all unknown never triggers
/// training, or every cycle would train again.
pub fn should_train(snapshot: &RegistrySnapshot, corpus_modified_at: EpochSeconds) -> bool {
    if creation_times_unknown(snapshot) {
        return false;
    }
    corpus_modified_at > newest_created_at(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClassifierRecord;
    use crate::registry::ClassifierStatus::{Available, Failed, Training};

    const FAMILY: &str = "self_nlc.csv";

    fn snapshot(records: Vec<ClassifierRecord>) -> RegistrySnapshot {
        RegistrySnapshot::new(FAMILY, records)
    }

    #[test]
    fn test_corpus_older_than_classifier_does_not_train() {
        let s = snapshot(vec![ClassifierRecord::new("a", 100, Available, FAMILY)]);
        assert!(!should_train(&s, 50));
    }

    #[test]
    fn test_corpus_newer_than_classifier_trains() {
        let s = snapshot(vec![ClassifierRecord::new("a", 100, Available, FAMILY)]);
        assert!(should_train(&s, 150));
    }

    #[test]
    fn test_equal_times_do_not_train() {
        let s = snapshot(vec![ClassifierRecord::new("a", 100, Available, FAMILY)]);
        assert!(!should_train(&s, 100));
    }

    #[test]
    fn test_in_flight_training_counts_as_newest() {
        let s = snapshot(vec![
            ClassifierRecord::new("a", 100, Available, FAMILY),
            ClassifierRecord::new("b", 160, Training, FAMILY),
        ]);
        assert!(!should_train(&s, 150));
    }

    #[test]
    fn test_failed_run_counts_as_newest() {
        let s = snapshot(vec![ClassifierRecord::new("f", 200, Failed, FAMILY)]);
        assert!(!should_train(&s, 150));
    }

    #[test]
    fn test_empty_snapshot_trains_for_any_existing_corpus() {
        let s = snapshot(vec![]);
        assert_eq!(newest_created_at(&s), 0);
        assert!(should_train(&s, 1));
    }

    #[test]
    fn test_only_unparsable_times_never_train() {
        let s = snapshot(vec![
            ClassifierRecord::from_service("garbled", "??", "Available", FAMILY),
            ClassifierRecord::from_service("worse", "2016-13-01T00:00:00", "Failed", FAMILY),
        ]);
        assert_eq!(newest_created_at(&s), 0);
        assert!(creation_times_unknown(&s));
        assert!(!should_train(&s, 10));
        assert!(!should_train(&s, i64::MAX));
    }

    #[test]
    fn test_unparsable_time_next_to_known_one_counts_as_epoch() {
        let s = snapshot(vec![
            ClassifierRecord::from_service("garbled", "??", "Available", FAMILY),
            ClassifierRecord::new("a", 100, Available, FAMILY),
        ]);
        assert!(!creation_times_unknown(&s));
        assert_eq!(newest_created_at(&s), 100);
        assert!(should_train(&s, 150));
    }

    #[test]
    fn test_repeated_evaluation_is_stable() {
        let s = snapshot(vec![ClassifierRecord::new("a", 100, Available, FAMILY)]);
        let first = should_train(&s, 150);
        assert!((0..10).all(|_| should_train(&s, 150) == first));
    }
}
