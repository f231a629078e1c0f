//! Asynchronous cover image generation.
//!
//! Image backends work in two steps: a task is submitted and then polled until
//! it reaches a terminal state. The polling policy lives with the caller; this
//! module only exposes the three calls.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use pressline_shared::{CoverConfig, PresslineError, Result, require_secret};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::http_client;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Identifier of a submitted generation task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Requested output size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// State of a generation task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    /// Terminal. The output URL may still be missing.
    Completed { output_url: Option<String> },
    /// Terminal.
    Failed { reason: Option<String> },
}

/// An asynchronous image generation backend.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Submit a generation task.
    async fn submit(&self, prompt: &str, dims: ImageDimensions) -> Result<TaskId>;

    /// Query the current state of a task.
    async fn poll_status(&self, task: &TaskId) -> Result<TaskStatus>;

    /// Remaining account credits, if the backend reports them.
    async fn remaining_credits(&self) -> Result<Option<f64>>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a str,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    output_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct AccountResponse {
    #[serde(default)]
    balance: Option<f64>,
}

impl From<StatusResponse> for TaskStatus {
    fn from(resp: StatusResponse) -> Self {
        match resp.status.to_ascii_lowercase().as_str() {
            "completed" | "succeeded" | "success" | "done" => Self::Completed {
                output_url: resp.output_url.filter(|u| !u.trim().is_empty()),
            },
            "failed" | "error" | "cancelled" | "canceled" => Self::Failed { reason: resp.error },
            "running" | "processing" | "in_progress" => Self::Running,
            _ => Self::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// HttpImageGenerator
// ---------------------------------------------------------------------------

/// Image generator backed by a task-based JSON API.
pub struct HttpImageGenerator {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HttpImageGenerator {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build from the `[cover]` section; the API key must be set.
    pub fn from_config(config: &CoverConfig) -> Result<Self> {
        // Individual calls are short; the overall ceiling is enforced by the poller.
        Self::new(
            &config.base_url,
            require_secret(&config.api_key_env)?,
            Duration::from_secs(30),
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PresslineError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PresslineError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| PresslineError::parse(format!("{url}: invalid response: {e}")))
    }
}

impl fmt::Debug for HttpImageGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpImageGenerator")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip_all, fields(width = dims.width, height = dims.height))]
    async fn submit(&self, prompt: &str, dims: ImageDimensions) -> Result<TaskId> {
        let url = format!("{}/tasks", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SubmitRequest {
                prompt,
                width: dims.width,
                height: dims.height,
            })
            .send()
            .await
            .map_err(|e| PresslineError::CoverGeneration(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PresslineError::CoverGeneration(format!(
                "{url}: submit rejected with HTTP {status}"
            )));
        }

        let body: SubmitResponse = response.json().await.map_err(|e| {
            PresslineError::CoverGeneration(format!("{url}: invalid submit response: {e}"))
        })?;

        debug!(task_id = %body.task_id, "image task submitted");
        Ok(TaskId(body.task_id))
    }

    async fn poll_status(&self, task: &TaskId) -> Result<TaskStatus> {
        let url = format!("{}/tasks/{}", self.base_url, task);
        let resp: StatusResponse = self.get_json(&url).await?;
        Ok(resp.into())
    }

    async fn remaining_credits(&self) -> Result<Option<f64>> {
        let url = format!("{}/account", self.base_url);
        let resp: AccountResponse = self.get_json(&url).await?;
        Ok(resp.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> HttpImageGenerator {
        HttpImageGenerator::new(&server.uri(), "img-key".into(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn status_mapping() {
        let status = |s: &str, url: Option<&str>| {
            TaskStatus::from(StatusResponse {
                status: s.into(),
                output_url: url.map(String::from),
                error: None,
            })
        };
        assert_eq!(status("queued", None), TaskStatus::Pending);
        assert_eq!(status("PROCESSING", None), TaskStatus::Running);
        assert_eq!(
            status("succeeded", Some("https://cdn.example.com/x.png")),
            TaskStatus::Completed {
                output_url: Some("https://cdn.example.com/x.png".into())
            }
        );
        assert_eq!(status("completed", Some("  ")), TaskStatus::Completed { output_url: None });
        assert_eq!(status("cancelled", None), TaskStatus::Failed { reason: None });
        assert_eq!(status("whatever", None), TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_submit_and_poll() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tasks"))
            .and(body_json(serde_json::json!({ "prompt": "a harbor", "width": 900, "height": 383 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "task_id": "t-1" })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/tasks/t-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "output_url": "https://cdn.example.com/t-1.png"
            })))
            .mount(&server)
            .await;

        let generator = generator(&server);
        let task = generator
            .submit("a harbor", ImageDimensions { width: 900, height: 383 })
            .await
            .unwrap();
        assert_eq!(task, TaskId("t-1".into()));

        let status = generator.poll_status(&task).await.unwrap();
        assert_eq!(
            status,
            TaskStatus::Completed {
                output_url: Some("https://cdn.example.com/t-1.png".into())
            }
        );
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(402))
            .mount(&server)
            .await;

        let err = generator(&server)
            .submit("x", ImageDimensions { width: 1, height: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, PresslineError::CoverGeneration(_)));
    }

    #[tokio::test]
    async fn test_remaining_credits() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/account"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "balance": 42.5 })))
            .mount(&server)
            .await;

        let credits = generator(&server).remaining_credits().await.unwrap();
        assert_eq!(credits, Some(42.5));
    }
}
