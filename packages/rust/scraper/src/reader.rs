//! `reader` backend: delegate extraction to a remote reader API.
//!
//! The API hands out short-lived session tokens. A token is obtained on
//! [`Scraper::refresh`] (or lazily on first use) and renewed once if a scrape
//! is rejected with 401.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pressline_shared::{ContentMetadata, PresslineError, Result, ScrapedContent, derive_content_id};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::{Scraper, USER_AGENT};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    results: Vec<ReaderResult>,
}

#[derive(Debug, Deserialize)]
struct ReaderResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    author: Option<String>,
}

// ---------------------------------------------------------------------------
// ReaderScraper
// ---------------------------------------------------------------------------

/// Scraper backed by a remote reader service.
pub struct ReaderScraper {
    client: Client,
    base_url: String,
    api_key: String,
    token: RwLock<Option<String>>,
}

impl ReaderScraper {
    pub fn new(base_url: &str, api_key: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PresslineError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            token: RwLock::new(None),
        })
    }

    async fn open_session(&self) -> Result<String> {
        let url = format!("{}/session", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PresslineError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PresslineError::Network(format!("{url}: HTTP {status}")));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PresslineError::parse(format!("{url}: invalid session response: {e}")))?;

        *self.token.write().await = Some(session.token.clone());
        Ok(session.token)
    }

    async fn current_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.open_session().await
    }

    /// One scrape call; `Ok(None)` means the token was rejected.
    async fn scrape_with(&self, token: &str, target: &str) -> Result<Option<ScrapeResponse>> {
        let url = format!("{}/scrape", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "url": target }))
            .send()
            .await
            .map_err(|e| PresslineError::Scrape(format!("{target}: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PresslineError::Scrape(format!("{target}: reader HTTP {status}")));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| PresslineError::Scrape(format!("{target}: invalid reader response: {e}")))?;
        Ok(Some(body))
    }

    fn to_content(&self, result: ReaderResult, requested: &str) -> Option<ScrapedContent> {
        let body = result.content.map(|c| c.trim().to_string()).unwrap_or_default();
        if body.is_empty() {
            return None;
        }
        let url = result.url.unwrap_or_else(|| requested.to_string());
        let id = result
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| derive_content_id(&url));

        Some(ScrapedContent {
            id,
            title: result.title.unwrap_or_default(),
            body,
            url,
            published_at: result.published_at,
            metadata: ContentMetadata {
                author: result.author,
                source: Some(self.name().to_string()),
                ..Default::default()
            },
            score: None,
        })
    }
}

#[async_trait]
impl Scraper for ReaderScraper {
    fn name(&self) -> &str {
        "reader"
    }

    #[instrument(skip_all, fields(scraper = "reader"))]
    async fn refresh(&self) -> Result<()> {
        self.open_session().await?;
        info!("reader session refreshed");
        Ok(())
    }

    #[instrument(skip_all, fields(scraper = "reader", url = %url))]
    async fn scrape(&self, url: &str) -> Result<Vec<ScrapedContent>> {
        let token = self.current_token().await?;

        let response = match self.scrape_with(&token, url).await? {
            Some(response) => response,
            None => {
                warn!("reader token rejected, renewing session");
                let token = self.open_session().await?;
                self.scrape_with(&token, url).await?.ok_or_else(|| {
                    PresslineError::Scrape(format!("{url}: reader rejected a fresh session"))
                })?
            }
        };

        let contents: Vec<ScrapedContent> = response
            .results
            .into_iter()
            .filter_map(|r| self.to_content(r, url))
            .collect();

        debug!(count = contents.len(), "reader results");
        Ok(contents)
    }
}
