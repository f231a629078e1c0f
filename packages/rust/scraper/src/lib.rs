//! Content scrapers and the keyed scraper registry.
//!
//! This crate provides:
//! - [`Scraper`]: the backend trait (scrape one URL, refresh credentials)
//! - [`ScraperRegistry`]: backends keyed by routing tag (`html`, `reader`, ...)
//! - [`HtmlScraper`] and [`ReaderScraper`]: the built-in backends

mod extract;
mod html;
mod reader;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use pressline_shared::{AppConfig, PresslineError, Result, ScrapedContent, require_secret};
use tracing::debug;

pub use extract::ExtractedArticle;
pub use html::HtmlScraper;
pub use reader::ReaderScraper;

/// User-Agent string for scraper requests.
pub(crate) const USER_AGENT: &str = concat!("Pressline/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A backend that turns an article URL into scraped content.
///
/// An empty vector means "no content found" and is not an error; hard
/// failures (network, HTTP status, unparseable response) are.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Routing tag of this backend.
    fn name(&self) -> &str;

    /// Scrape the given URL.
    async fn scrape(&self, url: &str) -> Result<Vec<ScrapedContent>>;

    /// Renew sessions or credentials. No-op for stateless backends.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Scrapers keyed by routing tag.
#[derive(Default, Clone)]
pub struct ScraperRegistry {
    scrapers: BTreeMap<String, Arc<dyn Scraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from config.
    ///
    /// `html` is always registered; `reader` only when a reader base URL is
    /// configured, and then its API key must be present in the environment.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(HtmlScraper::new(config.scraper.timeout_secs)?));

        if let Some(base_url) = &config.scraper.reader_base_url {
            let api_key = require_secret(&config.scraper.reader_api_key_env)?;
            registry.register(Arc::new(ReaderScraper::new(
                base_url,
                api_key,
                config.scraper.timeout_secs,
            )?));
        }

        debug!(tags = ?registry.tags(), "scraper registry built");
        Ok(registry)
    }

    /// Register a scraper under its own name, replacing any previous one.
    pub fn register(&mut self, scraper: Arc<dyn Scraper>) {
        self.scrapers.insert(scraper.name().to_string(), scraper);
    }

    /// Look up the scraper for a routing tag.
    pub fn get(&self, tag: &str) -> Result<Arc<dyn Scraper>> {
        self.scrapers
            .get(tag)
            .cloned()
            .ok_or_else(|| PresslineError::UnknownScraper {
                tag: tag.to_string(),
            })
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        self.scrapers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }
}
