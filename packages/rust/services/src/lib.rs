//! Provider adapters used by the pipeline stages.
//!
//! This crate provides:
//! - [`summarizer`]: content rewriting through an OpenAI-compatible chat API
//! - [`image`]: submit/poll cover image generation
//! - [`publisher`]: media upload and article publication
//! - [`notifier`]: out-of-band notifications (webhook or log)
//!
//! Each concern is a `Send + Sync` async trait so the orchestrator can hold
//! `Arc<dyn ...>` handles and tests can swap in in-memory fakes.

pub mod image;
pub mod notifier;
pub mod publisher;
pub mod summarizer;

use std::time::Duration;

use pressline_shared::{PresslineError, Result};
use reqwest::Client;

pub use image::{HttpImageGenerator, ImageDimensions, ImageGenerator, TaskId, TaskStatus};
pub use notifier::{LogNotifier, Notifier, NotifyLevel, WebhookNotifier, notifier_from_config};
pub use publisher::{HttpPublisher, MediaReference, PublishRequest, Publisher};
pub use summarizer::{ChatSummarizer, Summarizer, Summary};

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("Pressline/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client with the shared user agent and a request timeout.
pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| PresslineError::Network(format!("failed to build HTTP client: {e}")))
}
