//! Out-of-band notifications.
//!
//! Notifications never fail the caller: the trait methods return `()` and
//! implementations log and swallow their own delivery errors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pressline_shared::{NotifierConfig, Result, optional_secret};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::http_client;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl NotifyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

/// A notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification. Must not panic or block indefinitely.
    async fn notify(&self, level: NotifyLevel, title: &str, body: &str);

    async fn info(&self, title: &str, body: &str) {
        self.notify(NotifyLevel::Info, title, body).await;
    }

    async fn warning(&self, title: &str, body: &str) {
        self.notify(NotifyLevel::Warning, title, body).await;
    }

    async fn error(&self, title: &str, body: &str) {
        self.notify(NotifyLevel::Error, title, body).await;
    }

    async fn success(&self, title: &str, body: &str) {
        self.notify(NotifyLevel::Success, title, body).await;
    }
}

/// Pick the notifier for the given config: webhook when its URL is set, log otherwise.
pub fn notifier_from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>> {
    match optional_secret(&config.webhook_url_env) {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(
            url,
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => {
            debug!(env = %config.webhook_url_env, "no webhook configured, notifications go to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

fn log_notification(level: NotifyLevel, title: &str, body: &str) {
    match level {
        NotifyLevel::Info | NotifyLevel::Success => {
            info!(level = level.as_str(), %title, %body, "notification")
        }
        NotifyLevel::Warning => warn!(%title, %body, "notification"),
        NotifyLevel::Error => error!(%title, %body, "notification"),
    }
}

// ---------------------------------------------------------------------------
// LogNotifier
// ---------------------------------------------------------------------------

/// Writes notifications to the tracing log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, level: NotifyLevel, title: &str, body: &str) {
        log_notification(level, title, body);
    }
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct WebhookPayload<'a> {
    level: NotifyLevel,
    title: &'a str,
    body: &'a str,
}

/// Posts notifications as JSON to a webhook, and logs them as well.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, level: NotifyLevel, title: &str, body: &str) {
        log_notification(level, title, body);

        let payload = WebhookPayload { level, title, body };
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!(status = %resp.status(), "webhook rejected notification"),
            Err(e) => warn!(error = %e, "webhook delivery failed"),
        }
    }
}
