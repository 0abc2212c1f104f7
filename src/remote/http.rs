//! HTTP implementation of [`RemoteService`].
//!
//! One API call per method, no retrying here. Error payloads come back as
//! `{"error": {"code": ..., "message": ...}}`; the message text is
//! preserved verbatim so [`RemoteError::class`] can match the transient
//! signatures.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{Job, JobState};

use super::{JobRef, RemoteError, RemoteService, SubmitRequest};

/// HTTP client for the geospatial batch-job API.
pub struct HttpRemote {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    id: String,
    description: String,
    state: JobState,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AssetDates {
    #[serde(default)]
    timestamps: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct SceneCount {
    count: i64,
}

impl HttpRemote {
    /// Create a client for the service at `base_url`.
    ///
    /// The connection-level timeout here is a backstop; the effective
    /// per-call deadline is enforced by the retry wrapper.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    async fn api_error(status: StatusCode, response: Response) -> RemoteError {
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => parsed.error.message,
            Err(_) => body,
        };
        RemoteError::Api {
            status: status.as_u16(),
            message,
        }
    }

    fn transport(e: reqwest::Error) -> RemoteError {
        RemoteError::Transport(e.to_string())
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobRef, RemoteError> {
        debug!(description = %request.description, "Submitting batch job");
        let response = self
            .client
            .post(self.url("/v1/jobs"))
            .json(request)
            .send()
            .await
            .map_err(Self::transport)?;
        let accepted: SubmitResponse = Self::read_json(response).await?;
        Ok(JobRef { id: accepted.id })
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RemoteError> {
        let response = self
            .client
            .get(self.url("/v1/jobs"))
            .send()
            .await
            .map_err(Self::transport)?;
        let list: JobList = Self::read_json(response).await?;
        Ok(list
            .jobs
            .into_iter()
            .map(|entry| Job {
                id: entry.id,
                description: entry.description,
                state: entry.state,
            })
            .collect())
    }

    async fn delete_asset(&self, path: &str) -> Result<(), RemoteError> {
        debug!(path, "Deleting asset");
        let response = self
            .client
            .delete(self.url(&format!("/v1/assets/{path}")))
            .send()
            .await
            .map_err(Self::transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }
        Ok(())
    }

    async fn asset_exists(&self, path: &str) -> Result<bool, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/assets/{path}")))
            .send()
            .await
            .map_err(Self::transport)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(Self::api_error(status, response).await),
        }
    }

    async fn asset_dates(
        &self,
        collection: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<i64>, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/assets/{collection}:listDates")))
            .query(&[
                ("start", start.format("%Y-%m-%d").to_string()),
                ("end", end.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .await
            .map_err(Self::transport)?;
        let dates: AssetDates = Self::read_json(response).await?;
        Ok(dates.timestamps)
    }

    async fn source_scene_count(&self, path: &str, date: NaiveDate) -> Result<i64, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/assets/{path}:sceneCount")))
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await
            .map_err(Self::transport)?;
        let scenes: SceneCount = Self::read_json(response).await?;
        Ok(scenes.count)
    }
}
