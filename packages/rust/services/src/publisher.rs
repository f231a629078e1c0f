//! Article publication.
//!
//! The publishing platform needs an access token (obtained with the API key
//! via [`Publisher::refresh`]), a hosted copy of the cover image (a media
//! reference), and finally the rendered article itself.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use pressline_render::RenderedDocument;
use pressline_shared::{
    PresslineError, PublishResult, PublishStatus, PublisherConfig, Result, require_secret,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::http_client;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Platform-hosted copy of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaReference {
    pub media_id: String,
    /// URL of the hosted copy, used as the cover inside the article.
    pub url: String,
}

/// Everything needed for one publish call.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub content_id: &'a str,
    pub document: &'a RenderedDocument,
    pub title: &'a str,
    /// Short summary shown in previews.
    pub digest: &'a str,
    pub media: &'a MediaReference,
    pub author: Option<&'a str>,
    pub source_url: &'a str,
}

/// A publishing platform.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    /// Renew the access token.
    async fn refresh(&self) -> Result<()>;

    /// Upload an image by URL and return the platform's reference to it.
    async fn upload_image(&self, source_url: &str) -> Result<MediaReference>;

    /// Publish a rendered article.
    async fn publish(&self, request: PublishRequest<'_>) -> Result<PublishResult>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct ArticleBody<'a> {
    title: &'a str,
    digest: &'a str,
    content_html: &'a str,
    cover_media_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<&'a str>,
    source_url: &'a str,
    publish: bool,
}

#[derive(Deserialize)]
struct ArticleResponse {
    status: PublishStatus,
    #[serde(default)]
    article_id: Option<String>,
    #[serde(default)]
    draft_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// HttpPublisher
// ---------------------------------------------------------------------------

/// Publisher backed by a token-authenticated JSON API.
pub struct HttpPublisher {
    client: Client,
    api_key: String,
    base_url: String,
    auto_publish: bool,
    default_author: Option<String>,
    token: RwLock<Option<String>>,
}

impl HttpPublisher {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            auto_publish: true,
            default_author: None,
            token: RwLock::new(None),
        })
    }

    /// Build from the `[publisher]` section; the API key must be set.
    pub fn from_config(config: &PublisherConfig) -> Result<Self> {
        let mut publisher = Self::new(
            &config.base_url,
            require_secret(&config.api_key_env)?,
            Duration::from_secs(config.timeout_secs),
        )?;
        publisher.auto_publish = config.auto_publish;
        publisher.default_author = config.default_author.clone();
        Ok(publisher)
    }

    async fn fetch_token(&self) -> Result<String> {
        let url = format!("{}/token", self.base_url);
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

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PresslineError::parse(format!("{url}: invalid token response: {e}")))?;

        *self.token.write().await = Some(body.access_token.clone());
        Ok(body.access_token)
    }

    async fn current_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.fetch_token().await
    }

    /// Send an authenticated request, renewing the token once on 401.
    async fn send_authed<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let token = self.current_token().await?;
        let response = build(&token)
            .send()
            .await
            .map_err(|e| PresslineError::Publish(format!("{url}: {e}")))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(%url, "access token rejected, renewing");
        let token = self.fetch_token().await?;
        build(&token)
            .send()
            .await
            .map_err(|e| PresslineError::Publish(format!("{url}: {e}")))
    }
}

impl fmt::Debug for HttpPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPublisher")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("auto_publish", &self.auto_publish)
            .finish()
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip_all)]
    async fn refresh(&self) -> Result<()> {
        self.fetch_token().await?;
        info!("publisher token refreshed");
        Ok(())
    }

    #[instrument(skip_all, fields(source = %source_url))]
    async fn upload_image(&self, source_url: &str) -> Result<MediaReference> {
        let url = format!("{}/media", self.base_url);
        let payload = serde_json::json!({ "source_url": source_url });
        let response = self
            .send_authed(&url, |token| {
                self.client.post(&url).bearer_auth(token).json(&payload)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PresslineError::Publish(format!(
                "{url}: media upload failed with HTTP {status}"
            )));
        }

        let media: MediaReference = response
            .json()
            .await
            .map_err(|e| PresslineError::Publish(format!("{url}: invalid media response: {e}")))?;

        debug!(media_id = %media.media_id, "image uploaded");
        Ok(media)
    }

    #[instrument(skip_all, fields(content_id = %request.content_id))]
    async fn publish(&self, request: PublishRequest<'_>) -> Result<PublishResult> {
        let url = format!("{}/articles", self.base_url);
        let body = ArticleBody {
            title: request.title,
            digest: request.digest,
            content_html: &request.document.html,
            cover_media_id: &request.media.media_id,
            author: request.author.or(self.default_author.as_deref()),
            source_url: request.source_url,
            publish: self.auto_publish,
        };

        let response = self
            .send_authed(&url, |token| self.client.post(&url).bearer_auth(token).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PresslineError::Publish(format!(
                "{url}: HTTP {status}: {}",
                detail.trim()
            )));
        }

        let article: ArticleResponse = response
            .json()
            .await
            .map_err(|e| PresslineError::Publish(format!("{url}: invalid publish response: {e}")))?;

        if article.status == PublishStatus::Failed {
            warn!(
                error = article.error.as_deref().unwrap_or("unspecified"),
                "platform reported publish failure"
            );
        }

        Ok(PublishResult {
            status: article.status,
            content_id: request.content_id.to_string(),
            article_id: article.article_id,
            draft_id: article.draft_id,
            url: article.url,
            error: article.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_token(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("authorization", "Bearer pub-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access_token": token })),
            )
            .mount(server)
            .await;
    }

    fn publisher(server: &MockServer) -> HttpPublisher {
        HttpPublisher::new(&server.uri(), "pub-key".into(), Duration::from_secs(5)).unwrap()
    }

    fn document() -> RenderedDocument {
        RenderedDocument {
            html: "<article>Body</article>".into(),
            article_count: 1,
        }
    }

    #[tokio::test]
    async fn test_upload_and_publish() {
        let server = MockServer::start().await;
        mount_token(&server, "acc-1").await;

        Mock::given(method("POST"))
            .and(path("/media"))
            .and(header("authorization", "Bearer acc-1"))
            .and(body_partial_json(serde_json::json!({ "source_url": "https://img.example.com/t.png" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "media_id": "m-9",
                "url": "https://media.example.com/m-9.png"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/articles"))
            .and(body_partial_json(serde_json::json!({
                "title": "Title",
                "cover_media_id": "m-9",
                "publish": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "published",
                "article_id": "a-1",
                "url": "https://platform.example.com/a-1"
            })))
            .mount(&server)
            .await;

        let publisher = publisher(&server);
        publisher.refresh().await.unwrap();
        let media = publisher.upload_image("https://img.example.com/t.png").await.unwrap();
        assert_eq!(media.media_id, "m-9");

        let doc = document();
        let result = publisher
            .publish(PublishRequest {
                content_id: "c-1",
                document: &doc,
                title: "Title",
                digest: "Digest",
                media: &media,
                author: None,
                source_url: "https://news.example.com/1",
            })
            .await
            .unwrap();

        assert_eq!(result.status, PublishStatus::Published);
        assert_eq!(result.content_id, "c-1");
        assert_eq!(result.article_id.as_deref(), Some("a-1"));
    }

    #[tokio::test]
    async fn test_expired_token_is_renewed_once() {
        let server = MockServer::start().await;
        mount_token(&server, "fresh").await;

        Mock::given(method("POST"))
            .and(path("/media"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "media_id": "m-1",
                "url": "https://media.example.com/m-1.png"
            })))
            .mount(&server)
            .await;

        let publisher = publisher(&server);
        *publisher.token.write().await = Some("stale".into());

        // Unmatched "stale" requests get wiremock's default 404, not 401,
        // so mount an explicit 401 for the stale token.
        Mock::given(method("POST"))
            .and(path("/media"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let media = publisher.upload_image("https://img.example.com/x.png").await.unwrap();
        assert_eq!(media.media_id, "m-1");
    }

    #[tokio::test]
    async fn test_draft_status_and_failures() {
        let server = MockServer::start().await;
        mount_token(&server, "acc").await;

        Mock::given(method("POST"))
            .and(path("/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "draft",
                "draft_id": "d-1"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/media"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let publisher = publisher(&server);
        let err = publisher.upload_image("https://img.example.com/x.png").await.unwrap_err();
        assert!(matches!(err, PresslineError::Publish(_)));

        let media = MediaReference {
            media_id: "m".into(),
            url: "https://media.example.com/m.png".into(),
        };
        let doc = document();
        let result = publisher
            .publish(PublishRequest {
                content_id: "c-2",
                document: &doc,
                title: "T",
                digest: "D",
                media: &media,
                author: Some("Ada"),
                source_url: "https://news.example.com/2",
            })
            .await
            .unwrap();
        assert_eq!(result.status, PublishStatus::Draft);
        assert!(result.status.is_processed());
        assert_eq!(result.draft_id.as_deref(), Some("d-1"));
    }

    #[tokio::test]
    async fn test_platform_failure_keeps_reason() {
        let server = MockServer::start().await;
        mount_token(&server, "acc").await;

        Mock::given(method("POST"))
            .and(path("/articles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failed",
                "error": "cover rejected by moderation"
            })))
            .mount(&server)
            .await;

        let publisher = publisher(&server);
        let media = MediaReference {
            media_id: "m".into(),
            url: "https://media.example.com/m.png".into(),
        };
        let doc = document();
        let result = publisher
            .publish(PublishRequest {
                content_id: "c-3",
                document: &doc,
                title: "T",
                digest: "D",
                media: &media,
                author: None,
                source_url: "https://news.example.com/3",
            })
            .await
            .unwrap();

        assert_eq!(result.status, PublishStatus::Failed);
        assert!(!result.status.is_processed());
        assert_eq!(result.error.as_deref(), Some("cover rejected by moderation"));
        assert!(result.article_id.is_none());
    }
}
