//! Classifier registry snapshot
//!
//! Point-in-time view of the classifiers the remote service reports for one
//! classifier family. Policies in [`crate::policy`] are pure functions over a
//! [`RegistrySnapshot`].

use chrono::{DateTime, Utc};
use nlcm_common::time::{self, EpochSeconds};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Remote classifier status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierStatus {
    Training,
    Available,
    Failed,
    /// Also used for any status string the service reports that we do not know
    Unavailable,
}

impl ClassifierStatus {
    /// Map a service status string (case-insensitive)
    pub fn from_service_str(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "training" => ClassifierStatus::Training,
            "available" => ClassifierStatus::Available,
            "failed" => ClassifierStatus::Failed,
            _ => ClassifierStatus::Unavailable,
        }
    }
}

/// One classifier as reported by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifierRecord {
    /// Opaque id assigned by the service
    pub id: String,
    /// Creation time in epoch seconds; `None` when the service timestamp was
    /// unparsable, which orders before every known time
    pub created_at: Option<EpochSeconds>,
    pub status: ClassifierStatus,
    /// Name of the corpus (family) the classifier was trained from
    pub display_name: String,
}

impl ClassifierRecord {
    pub fn new(
        id: impl Into<String>,
        created_at: EpochSeconds,
        status: ClassifierStatus,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            created_at: Some(created_at),
            status,
            display_name: display_name.into(),
        }
    }

    /// Build a record from raw service fields, normalizing time and status
    ///
    /// An unparsable creation time is logged and kept as `None` rather than
    /// failing the snapshot.
    pub fn from_service(id: &str, created: &str, status: &str, display_name: &str) -> Self {
        let created_at = time::parse_service_timestamp(created);
        if created_at.is_none() {
            warn!(
                "Classifier {} has unparsable creation time {:?}; treating as oldest",
                id, created
            );
        }

        Self {
            id: id.to_string(),
            created_at,
            status: ClassifierStatus::from_service_str(status),
            display_name: display_name.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ClassifierStatus::Available
    }
}

/// Registry snapshot scoped to one classifier family
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    family_name: String,
    records: Vec<ClassifierRecord>,
    fetched_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    /// Build a snapshot from service records
    ///
    /// Records whose `display_name` differs from `family_name` belong to
    /// unrelated corpora and are dropped. Ids are unique: if the service
    /// reports an id twice, the first occurrence is kept.
    pub fn new(
        family_name: impl Into<String>,
        records: impl IntoIterator<Item = ClassifierRecord>,
    ) -> Self {
        let family_name = family_name.into();
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for record in records {
            if record.display_name != family_name {
                continue;
            }
            if !seen.insert(record.id.clone()) {
                warn!("Duplicate classifier id {} in listing; keeping first", record.id);
                continue;
            }
            kept.push(record);
        }

        Self {
            family_name,
            records: kept,
            fetched_at: time::now(),
        }
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Records in service listing order
    pub fn records(&self) -> &[ClassifierRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&ClassifierRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Copy of this snapshot with `record` appended (unless its id is already present)
    pub fn with_record(&self, record: ClassifierRecord) -> Self {
        let mut copy = self.clone();
        if !copy.contains(&record.id) && record.display_name == copy.family_name {
            copy.records.push(record);
        }
        copy
    }
}
