//! Candidate feed source.
//!
//! Each run starts by asking an external feed API for the articles worth
//! processing. The feed answers with a JSON list of candidate references; this
//! crate fetches it, drops malformed entries and hands back [`Candidate`]s in
//! feed order.

mod parser;

use async_trait::async_trait;
use pressline_shared::{Candidate, FeedConfig, PresslineError, Result, optional_secret};
use reqwest::Client;
use tracing::{info, instrument, warn};
use url::Url;

pub use parser::ParsedFeed;

/// User-Agent string for feed requests.
const USER_AGENT: &str = concat!("Pressline/", env!("CARGO_PKG_VERSION"));

/// Maximum response size we consider valid (5 MB).
const MAX_RESPONSE_SIZE: u64 = 5 * 1024 * 1024;

// ---------------------------------------------------------------------------
// FeedSource trait
// ---------------------------------------------------------------------------

/// A source of candidate articles.
///
/// Implementations report an unreachable, misconfigured or garbled feed as
/// [`PresslineError::FeedUnavailable`]. An empty list is a valid answer; the
/// caller decides whether that is fatal.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetch the current list of candidates.
    async fn get_candidates(&self) -> Result<Vec<Candidate>>;
}

// ---------------------------------------------------------------------------
// Feed options
// ---------------------------------------------------------------------------

/// Runtime options for [`HttpFeedSource`].
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Base URL; candidates are read from `{base_url}/candidates`.
    pub base_url: String,
    /// Bearer token, if the feed requires one.
    pub api_key: Option<String>,
    /// Optional query/category filter.
    pub query: Option<String>,
    /// Upper bound forwarded to the feed as `limit`.
    pub limit: usize,
    pub timeout_secs: u64,
}

impl FeedOptions {
    /// Build options from the `[feed]` section, resolving the key from the environment.
    pub fn from_config(config: &FeedConfig, limit: usize) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: optional_secret(&config.api_key_env),
            query: config.query.clone(),
            limit,
            timeout_secs: config.timeout_secs,
        }
    }

    /// Replace the query (used by scheduled workflows).
    pub fn with_query(mut self, query: Option<String>) -> Self {
        if query.is_some() {
            self.query = query;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// HttpFeedSource
// ---------------------------------------------------------------------------

/// Feed source backed by a JSON HTTP API.
pub struct HttpFeedSource {
    client: Client,
    endpoint: Url,
    opts: FeedOptions,
}

impl HttpFeedSource {
    pub fn new(opts: FeedOptions) -> Result<Self> {
        let endpoint = candidates_endpoint(&opts.base_url)?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| PresslineError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            opts,
        })
    }

    async fn fetch_body(&self) -> Result<String> {
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("limit", self.opts.limit.to_string())]);
        if let Some(query) = &self.opts.query {
            request = request.query(&[("query", query)]);
        }
        if let Some(key) = &self.opts.api_key {
            request = request.bearer_auth(key);
        }

        let url = &self.endpoint;
        let response = request
            .send()
            .await
            .map_err(|e| PresslineError::FeedUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PresslineError::FeedUnavailable(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(PresslineError::FeedUnavailable(format!(
                    "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        response
            .text()
            .await
            .map_err(|e| PresslineError::FeedUnavailable(format!("{url}: failed to read body: {e}")))
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn get_candidates(&self) -> Result<Vec<Candidate>> {
        let body = self.fetch_body().await?;

        let parsed = parser::parse_feed(&body).map_err(|e| {
            PresslineError::FeedUnavailable(format!("{}: {e}", self.endpoint))
        })?;

        if parsed.dropped > 0 {
            warn!(dropped = parsed.dropped, "feed contained malformed entries");
        }
        info!(count = parsed.candidates.len(), "feed candidates fetched");

        Ok(parsed.candidates)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `{base}/candidates`, tolerating a trailing slash on the base.
fn candidates_endpoint(base: &str) -> Result<Url> {
    let joined = format!("{}/candidates", base.trim_end_matches('/'));
    Url::parse(&joined).map_err(|e| {
        PresslineError::FeedUnavailable(format!("invalid feed base url '{base}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(base: &str) -> FeedOptions {
        FeedOptions {
            base_url: base.to_string(),
            api_key: Some("feed-secret".into()),
            query: None,
            limit: 5,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_candidates_endpoint() {
        let url = candidates_endpoint("https://feed.example.com/api/").unwrap();
        assert_eq!(url.as_str(), "https://feed.example.com/api/candidates");
        assert!(matches!(
            candidates_endpoint("not a base"),
            Err(PresslineError::FeedUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_with_mock_server() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/candidates"))
            .and(wiremock::matchers::query_param("limit", "5"))
            .and(wiremock::matchers::query_param("query", "technology"))
            .and(wiremock::matchers::header("authorization", "Bearer feed-secret"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                r#"{"items":[
                    {"id":"1","title":"One","url":"https://news.example.com/1"},
                    {"id":"2","title":"","url":"https://news.example.com/2"},
                    {"id":"3","title":"Three","url":"https://news.example.com/3"}
                ]}"#,
            ))
            .mount(&server)
            .await;

        let source =
            HttpFeedSource::new(opts(&server.uri()).with_query(Some("technology".into()))).unwrap();
        let candidates = source.get_candidates().await.unwrap();

        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_empty_feed_is_ok() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/candidates"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let source = HttpFeedSource::new(opts(&server.uri())).unwrap();
        let candidates = source.get_candidates().await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_http_error_is_unavailable() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/candidates"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpFeedSource::new(opts(&server.uri())).unwrap();
        let err = source.get_candidates().await.unwrap_err();
        assert!(matches!(err, PresslineError::FeedUnavailable(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_garbled_body_is_unavailable() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/candidates"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let source = HttpFeedSource::new(opts(&server.uri())).unwrap();
        let err = source.get_candidates().await.unwrap_err();
        assert!(matches!(err, PresslineError::FeedUnavailable(_)));
    }
}
