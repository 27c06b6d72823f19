//! Remote classifier service
//!
//! The reconciler talks to the service only through [`ClassifierService`];
//! the concrete client is injected at construction. Timeouts are the
//! implementation's job and surface as ordinary failures.

mod http;

pub use http::{HttpClassifierService, HttpServiceConfig};

use crate::registry::ClassifierRecord;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Classifier service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Service rejected credentials")]
    Unauthorized,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Corpus error: {0}")]
    Corpus(String),
}

/// Everything needed to submit one training job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRequest {
    /// Family (corpus) name the new classifier is registered under
    pub family_name: String,
    /// Locale tag, passed through untouched
    pub language: String,
    /// Corpus file whose current contents are uploaded
    pub corpus_path: PathBuf,
}

/// Operations the lifecycle manager needs from the remote service
#[async_trait]
pub trait ClassifierService: Send + Sync {
    /// List all classifiers of one family, with status
    async fn list_classifiers(&self, family_name: &str)
        -> Result<Vec<ClassifierRecord>, ServiceError>;

    /// Submit a training job; returns the new record (initially `Training`)
    async fn submit_training(
        &self,
        request: &TrainingRequest,
    ) -> Result<ClassifierRecord, ServiceError>;

    /// Delete one classifier
    async fn delete_classifier(&self, classifier_id: &str) -> Result<(), ServiceError>;
}
