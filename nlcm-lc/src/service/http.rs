//! HTTP classifier service client
//!
//! REST client for a natural-language-classifier style API:
//! - `GET    /v1/classifiers`        listing (no status)
//! - `GET    /v1/classifiers/{id}`   detail with status
//! - `POST   /v1/classifiers`        multipart training upload
//! - `DELETE /v1/classifiers/{id}`

use super::{ClassifierService, ServiceError, TrainingRequest};
use crate::registry::ClassifierRecord;
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("nlcm-lc/", env!("CARGO_PKG_VERSION"));
const CORPUS_UPLOAD_NAME: &str = "training_data.csv";

/// Connection settings for [`HttpClassifierService`]
#[derive(Debug, Clone)]
pub struct HttpServiceConfig {
    /// Service root, e.g. `https://gateway.example.com/natural-language-classifier/api`
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ClassifierListResponse {
    #[serde(default)]
    classifiers: Vec<ClassifierSummary>,
}

#[derive(Debug, Deserialize)]
struct ClassifierSummary {
    classifier_id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ClassifierDetail {
    classifier_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    created: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Serialize)]
struct TrainingMetadata<'a> {
    language: &'a str,
    name: &'a str,
}

impl ClassifierDetail {
    fn into_record(self, family_fallback: &str) -> ClassifierRecord {
        let name = if self.name.is_empty() {
            family_fallback
        } else {
            self.name.as_str()
        };
        ClassifierRecord::from_service(&self.classifier_id, &self.created, &self.status, name)
    }
}

/// reqwest-backed [`ClassifierService`]
pub struct HttpClassifierService {
    http_client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpClassifierService {
    pub fn new(config: HttpServiceConfig) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username,
            password: config.password,
        })
    }

    fn classifiers_url(&self) -> String {
        format!("{}/v1/classifiers", self.base_url)
    }

    fn classifier_url(&self, classifier_id: &str) -> String {
        format!("{}/v1/classifiers/{}", self.base_url, classifier_id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http_client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ServiceError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        check_status(response).await
    }

    async fn fetch_detail(&self, classifier_id: &str) -> Result<ClassifierDetail, ServiceError> {
        let response = self
            .send(self.request(Method::GET, &self.classifier_url(classifier_id)))
            .await?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ServiceError::Unauthorized);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ServiceError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

#[async_trait]
impl ClassifierService for HttpClassifierService {
    async fn list_classifiers(
        &self,
        family_name: &str,
    ) -> Result<Vec<ClassifierRecord>, ServiceError> {
        let listing: ClassifierListResponse = self
            .send(self.request(Method::GET, &self.classifiers_url()))
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        let ids: Vec<String> = listing
            .classifiers
            .into_iter()
            .filter(|c| c.name == family_name)
            .map(|c| c.classifier_id)
            .collect();

        tracing::debug!(
            family = family_name,
            matching = ids.len(),
            "Fetching classifier details"
        );

        // All-or-nothing: a snapshot missing one record could hide the newest
        // classifier and look like a stale corpus.
        let details = try_join_all(ids.iter().map(|id| self.fetch_detail(id))).await?;

        Ok(details
            .into_iter()
            .map(|d| d.into_record(family_name))
            .collect())
    }

    async fn submit_training(
        &self,
        request: &TrainingRequest,
    ) -> Result<ClassifierRecord, ServiceError> {
        let corpus = tokio::fs::read(&request.corpus_path).await.map_err(|e| {
            ServiceError::Corpus(format!("{}: {}", request.corpus_path.display(), e))
        })?;

        let metadata = serde_json::to_string(&TrainingMetadata {
            language: &request.language,
            name: &request.family_name,
        })
        .map_err(|e| ServiceError::Parse(e.to_string()))?;

        let training_data = reqwest::multipart::Part::bytes(corpus)
            .file_name(CORPUS_UPLOAD_NAME)
            .mime_str("text/csv")
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("training_metadata", metadata)
            .part("training_data", training_data);

        tracing::info!(
            family = %request.family_name,
            language = %request.language,
            "Uploading training corpus"
        );

        let detail: ClassifierDetail = self
            .send(
                self.request(Method::POST, &self.classifiers_url())
                    .multipart(form),
            )
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        Ok(detail.into_record(&request.family_name))
    }

    async fn delete_classifier(&self, classifier_id: &str) -> Result<(), ServiceError> {
        let response = self
            .request(Method::DELETE, &self.classifier_url(classifier_id))
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        // Already gone is as good as deleted
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(classifier_id, "Classifier already deleted");
            return Ok(());
        }

        check_status(response).await.map(|_| ())
    }
}
