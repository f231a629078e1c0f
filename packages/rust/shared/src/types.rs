//! Core domain types flowing through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// Reference to one prospective article, as returned by the feed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// External identifier assigned by the feed.
    pub id: String,
    /// Headline as listed by the feed.
    pub title: String,
    /// Source URL to scrape.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Image URL or prompt fragment suggested by the feed for the cover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_hint: Option<String>,
}

// ---------------------------------------------------------------------------
// ScrapedContent
// ---------------------------------------------------------------------------

/// Metadata bag attached to scraped content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    /// Keywords; empty until the summarizer fills them in.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Name of the scraper backend that produced the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Backend-specific fields that do not map onto the record.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Full content scraped for one candidate.
///
/// Mutated in place by the summarize stage; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Canonical URL of the article.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: ContentMetadata,
    /// Quality score, usually assigned by the summarizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Derive a stable content identifier from a URL (hex SHA-256).
pub fn derive_content_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// RenderableArticle
// ---------------------------------------------------------------------------

/// ScrapedContent projected into the shape the template renderer expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderableArticle {
    pub content_id: String,
    pub title: String,
    /// Short summary shown above the body and sent as the publish digest.
    pub digest: String,
    pub body: String,
    pub source_url: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub keywords: Vec<String>,
    pub score: Option<f32>,
    /// Resolved cover image (the uploaded media URL).
    pub cover_url: String,
}

impl RenderableArticle {
    /// Build a renderable view of `content` with the given cover and digest.
    pub fn from_content(content: &ScrapedContent, cover_url: &str, digest: String) -> Self {
        Self {
            content_id: content.id.clone(),
            title: content.title.clone(),
            digest,
            body: content.body.clone(),
            source_url: content.url.clone(),
            author: content.metadata.author.clone(),
            published_at: content.published_at,
            keywords: content.metadata.keywords.clone(),
            score: content.score,
            cover_url: cover_url.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// PublishResult
// ---------------------------------------------------------------------------

/// Outcome status of one publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Published,
    Draft,
    Failed,
}

impl PublishStatus {
    /// Published and draft both count as "processed".
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Published | Self::Draft)
    }
}

/// Outcome of one publish attempt, with provider-assigned identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    pub status: PublishStatus,
    /// Id of the ScrapedContent that was published.
    pub content_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Reason given by the platform when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
