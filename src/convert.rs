//! Client for the external document-conversion service.
//!
//! The service exposes two protocols behind the same result shape:
//!
//! * **Sync** — `POST /v1/convert/file` with a multipart upload; the
//!   response body is the conversion result. Used for small inputs and for
//!   individual chunks.
//! * **Async** — `POST /v1/convert/file/async` returns a task id;
//!   `GET /v1/status/poll/{task_id}` is polled at a fixed interval until the
//!   status is terminal (`success`/`failure`), then
//!   `GET /v1/result/{task_id}` fetches the result. Used for large unsplit
//!   inputs whose conversion outlives the sync request limit.
//!
//! A job that exceeds the maximum wait is abandoned, not cancelled
//! upstream: the caller gets [`ConversionError::PollTimeout`] and the task
//! id is not retried by this layer. A poll round that itself errors is
//! logged and retried at the next interval.
//!
//! Both methods return the raw service response as [`serde_json::Value`];
//! dialect handling is the normalizer's job, not the client's.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::AnalyzeConfig;
use crate::error::ConversionError;
use crate::output::MimeClass;

/// Conversion backend seam.
///
/// The production implementation is [`ConversionClient`]; tests inject
/// scripted backends through
/// [`crate::config::AnalyzeConfigBuilder::converter`].
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert one file through the synchronous endpoint.
    async fn convert_sync(&self, path: &Path) -> Result<Value, ConversionError>;

    /// Convert one file through the submit → poll → fetch protocol.
    async fn convert_async(&self, path: &Path) -> Result<Value, ConversionError>;
}

/// HTTP client for the conversion service.
pub struct ConversionClient {
    base_url: String,
    http: reqwest::Client,
    poll_interval: Duration,
    max_poll_wait: Duration,
}

impl ConversionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        ConversionClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            poll_interval: Duration::from_secs(3),
            max_poll_wait: Duration::from_secs(600),
        }
    }

    /// Build a client from run configuration.
    pub fn from_config(config: &AnalyzeConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        ConversionClient {
            base_url: config.conversion_base_url.trim_end_matches('/').to_string(),
            http,
            poll_interval: config.poll_interval,
            max_poll_wait: config.max_poll_wait,
        }
    }

    /// Whether the service answers its health endpoint.
    pub async fn is_available(&self) -> bool {
        self.http
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn upload_form(&self, path: &Path) -> Result<reqwest::multipart::Form, ConversionError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| ConversionError::BadResponse {
            detail: format!("could not read '{}': {e}", path.display()),
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let content_type = MimeClass::from_path(path).content_type(path);
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(content_type)
            .map_err(|e| ConversionError::BadResponse {
                detail: format!("invalid content type: {e}"),
            })?;
        Ok(reqwest::multipart::Form::new().part("files", part))
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, ConversionError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ConversionError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ConversionError::BadResponse { detail: e.to_string() })
    }
}

#[async_trait]
impl DocumentConverter for ConversionClient {
    async fn convert_sync(&self, path: &Path) -> Result<Value, ConversionError> {
        debug!("submitting '{}' to sync conversion endpoint", path.display());
        let form = self.upload_form(path).await?;
        let response = self
            .http
            .post(format!("{}/v1/convert/file", self.base_url))
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn convert_async(&self, path: &Path) -> Result<Value, ConversionError> {
        // 1. Submit the job.
        let form = self.upload_form(path).await?;
        let submit = self
            .http
            .post(format!("{}/v1/convert/file/async", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let submitted = Self::read_json(submit).await?;
        let task_id = submitted
            .get("task_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ConversionError::MissingTaskId)?;

        info!(task_id = task_id.as_str(), "async conversion job submitted");

        // 2. Poll until terminal status or the maximum wait elapses.
        let mut elapsed = Duration::ZERO;
        let mut last_status = String::new();

        while elapsed < self.max_poll_wait {
            sleep(self.poll_interval).await;
            elapsed += self.poll_interval;

            let poll = self
                .http
                .get(format!("{}/v1/status/poll/{task_id}", self.base_url))
                .timeout(Duration::from_secs(10))
                .send()
                .await;

            let status_body = match poll {
                Ok(r) if r.status().is_success() => match r.json::<Value>().await {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(task_id = task_id.as_str(), "poll body unreadable: {e}");
                        continue;
                    }
                },
                Ok(r) => {
                    warn!(task_id = task_id.as_str(), status = r.status().as_u16(), "status poll failed");
                    continue;
                }
                Err(e) => {
                    warn!(task_id = task_id.as_str(), "status poll error: {e}");
                    continue;
                }
            };

            let task_status = status_body
                .get("task_status")
                .or_else(|| status_body.get("status"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_ascii_lowercase();

            if task_status != last_status {
                info!(
                    task_id = task_id.as_str(),
                    status = task_status.as_str(),
                    elapsed_s = elapsed.as_secs(),
                    "conversion job status"
                );
                last_status = task_status.clone();
            }

            match task_status.as_str() {
                "success" => {
                    // 3. Fetch the result.
                    let result = self
                        .http
                        .get(format!("{}/v1/result/{task_id}", self.base_url))
                        .send()
                        .await?;
                    return Self::read_json(result).await;
                }
                "failure" | "error" => {
                    return Err(ConversionError::JobFailed {
                        task_id,
                        detail: status_body.to_string(),
                    });
                }
                // queued / running / unknown → keep polling
                _ => {}
            }
        }

        Err(ConversionError::PollTimeout {
            task_id,
            secs: self.max_poll_wait.as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ConversionClient::new("http://localhost:5001/");
        assert_eq!(client.base_url, "http://localhost:5001");
    }

    #[tokio::test]
    async fn unreachable_service_is_not_available() {
        // Reserved TEST-NET address: connection fails fast.
        let client = ConversionClient::new("http://192.0.2.1:1");
        assert!(!client.is_available().await);
    }
}
