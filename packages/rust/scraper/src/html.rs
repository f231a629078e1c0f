//! `html` backend: fetch the article page directly and extract it locally.

use std::time::Duration;

use async_trait::async_trait;
use pressline_shared::{ContentMetadata, PresslineError, Result, ScrapedContent, derive_content_id};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::extract::extract_article;
use crate::{Scraper, USER_AGENT};

/// Maximum number of redirects to follow per article.
const MAX_REDIRECTS: usize = 5;

/// Maximum page size we are willing to parse (8 MB).
const MAX_PAGE_SIZE: u64 = 8 * 1024 * 1024;

/// Scraper that downloads the page and extracts the article from its HTML.
pub struct HtmlScraper {
    client: Client,
}

impl HtmlScraper {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PresslineError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &Url) -> Result<(Url, String)> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| PresslineError::Scrape(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PresslineError::Scrape(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_PAGE_SIZE {
                return Err(PresslineError::Scrape(format!(
                    "{url}: page too large ({len} bytes, max {MAX_PAGE_SIZE})"
                )));
            }
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| PresslineError::Scrape(format!("{url}: body read failed: {e}")))?;

        Ok((final_url, body))
    }
}

#[async_trait]
impl Scraper for HtmlScraper {
    fn name(&self) -> &str {
        "html"
    }

    #[instrument(skip_all, fields(scraper = "html", url = %url))]
    async fn scrape(&self, url: &str) -> Result<Vec<ScrapedContent>> {
        let parsed = Url::parse(url)
            .map_err(|e| PresslineError::Scrape(format!("invalid url '{url}': {e}")))?;

        let (final_url, html) = self.fetch(&parsed).await?;
        let article = extract_article(&html, &final_url)?;

        if article.body.is_empty() {
            debug!("page has no readable content");
            return Ok(Vec::new());
        }

        let canonical = article.canonical_url.unwrap_or_else(|| final_url.to_string());
        debug!(body_len = article.body.len(), "article extracted");

        Ok(vec![ScrapedContent {
            id: derive_content_id(&canonical),
            title: article.title.unwrap_or_default(),
            body: article.body,
            url: canonical,
            published_at: article.published_at,
            metadata: ContentMetadata {
                author: article.author,
                source: Some(self.name().to_string()),
                ..Default::default()
            },
            score: None,
        }])
    }
}
