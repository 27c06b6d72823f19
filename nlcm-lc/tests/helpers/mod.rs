//! Shared test utilities for nlcm-lc integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use nlcm_common::time::now_epoch;
use nlcm_lc::registry::{ClassifierRecord, ClassifierStatus};
use nlcm_lc::service::{ClassifierService, ServiceError, TrainingRequest};
use std::collections::HashSet;
use std::sync::Mutex;

pub const FAMILY: &str = "self_nlc.csv";

/// In-memory classifier service with call logs and failure switches
#[derive(Default)]
pub struct FakeClassifierService {
    inner: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    records: Vec<ClassifierRecord>,
    list_calls: usize,
    training_requests: Vec<TrainingRequest>,
    deletions: Vec<String>,
    fail_list: bool,
    fail_train: bool,
    fail_delete: HashSet<String>,
    next_id: u64,
}

impl FakeClassifierService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ClassifierRecord>) -> Self {
        let service = Self::new();
        service.inner.lock().unwrap().records = records;
        service
    }

    pub fn add_record(&self, record: ClassifierRecord) {
        self.inner.lock().unwrap().records.push(record);
    }

    pub fn set_status(&self, classifier_id: &str, status: ClassifierStatus) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.records.iter_mut().find(|r| r.id == classifier_id) {
            record.status = status;
        }
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.inner.lock().unwrap().fail_list = fail;
    }

    pub fn set_fail_train(&self, fail: bool) {
        self.inner.lock().unwrap().fail_train = fail;
    }

    pub fn set_fail_delete(&self, classifier_id: &str, fail: bool) {
        let mut inner = self.inner.lock().unwrap();
        if fail {
            inner.fail_delete.insert(classifier_id.to_string());
        } else {
            inner.fail_delete.remove(classifier_id);
        }
    }

    pub fn record_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.inner.lock().unwrap().list_calls
    }

    pub fn training_requests(&self) -> Vec<TrainingRequest> {
        self.inner.lock().unwrap().training_requests.clone()
    }

    pub fn deletions(&self) -> Vec<String> {
        self.inner.lock().unwrap().deletions.clone()
    }
}

#[async_trait]
impl ClassifierService for FakeClassifierService {
    async fn list_classifiers(
        &self,
        family_name: &str,
    ) -> Result<Vec<ClassifierRecord>, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.list_calls += 1;
        if inner.fail_list {
            return Err(ServiceError::Network("connection refused".to_string()));
        }
        Ok(inner
            .records
            .iter()
            .filter(|r| r.display_name == family_name)
            .cloned()
            .collect())
    }

    async fn submit_training(
        &self,
        request: &TrainingRequest,
    ) -> Result<ClassifierRecord, ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.training_requests.push(request.clone());
        if inner.fail_train {
            return Err(ServiceError::Api {
                status: 400,
                message: "training rejected".to_string(),
            });
        }

        inner.next_id += 1;
        // Strictly newer than any corpus written before the call
        let record = ClassifierRecord::new(
            format!("trained-{}", inner.next_id),
            now_epoch() + 1,
            ClassifierStatus::Training,
            &request.family_name,
        );
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn delete_classifier(&self, classifier_id: &str) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_delete.contains(classifier_id) {
            return Err(ServiceError::Api {
                status: 500,
                message: "delete failed".to_string(),
            });
        }
        inner.deletions.push(classifier_id.to_string());
        inner.records.retain(|r| r.id != classifier_id);
        Ok(())
    }
}

pub fn record(id: &str, created_at: i64, status: ClassifierStatus) -> ClassifierRecord {
    ClassifierRecord::new(id, created_at, status, FAMILY)
}
