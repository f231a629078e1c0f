//! Stage functions of the per-item pipeline.
//!
//! Each stage is a narrow unit the orchestrator calls in sequence. Stages
//! record their own outcome in [`RunStats`]; they never retry internally.

use std::slice;

use tracing::{debug, info, instrument, warn};

use pressline_feed::FeedSource;
use pressline_render::{plain_text, render};
use pressline_scraper::Scraper;
use pressline_services::{ImageGenerator, Notifier, PublishRequest, Publisher, Summarizer};
use pressline_shared::{
    Candidate, CoverPolicy, PresslineError, PublishResult, RenderableArticle, Result,
    ScrapedContent,
};

use crate::cover::{cover_prompt, generate_cover};
use crate::stats::RunStats;

/// Title used when neither the summarizer nor the scraper produced one.
pub const PLACEHOLDER_TITLE: &str = "Untitled";
/// Body used when neither the summarizer nor the scraper produced one.
pub const PLACEHOLDER_BODY: &str = "(no content)";

const DIGEST_CHARS: usize = 140;

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Fetch candidates from the feed and apply the batch cap.
///
/// Errors are `FeedUnavailable` when the feed cannot be read and `FeedEmpty`
/// when it answered with no usable candidates.
#[instrument(skip_all, fields(feed = feed.name(), max_candidates = max_candidates))]
pub async fn fetch_candidates(feed: &dyn FeedSource, max_candidates: usize) -> Result<Vec<Candidate>> {
    let mut candidates = match feed.get_candidates().await {
        Ok(candidates) => candidates,
        Err(e @ PresslineError::FeedUnavailable(_)) => return Err(e),
        Err(e) => return Err(PresslineError::FeedUnavailable(e.to_string())),
    };

    if candidates.is_empty() {
        return Err(PresslineError::FeedEmpty);
    }

    if candidates.len() > max_candidates {
        debug!(
            received = candidates.len(),
            max_candidates, "truncating candidate batch"
        );
        candidates.truncate(max_candidates);
    }

    info!(count = candidates.len(), "candidates fetched");
    Ok(candidates)
}

// ---------------------------------------------------------------------------
// Scrape
// ---------------------------------------------------------------------------

/// Scrape one candidate. `Ok(None)` means the page had no extractable content.
///
/// Only the first result is kept. Fields the scraper left empty are filled
/// from the candidate.
#[instrument(skip_all, fields(scraper = scraper.name(), id = %candidate.id, url = %candidate.url))]
pub async fn scrape_one(
    scraper: &dyn Scraper,
    candidate: &Candidate,
    stats: &mut RunStats,
) -> Result<Option<ScrapedContent>> {
    let results = match scraper.scrape(&candidate.url).await {
        Ok(results) => results,
        Err(e) => {
            stats.scrape.record(false);
            return Err(e);
        }
    };

    let Some(mut content) = results.into_iter().next() else {
        stats.scrape.record(false);
        warn!("scraper found no content");
        return Ok(None);
    };

    if content.title.trim().is_empty() {
        content.title = candidate.title.clone();
    }
    if content.metadata.author.is_none() {
        content.metadata.author = candidate.author.clone();
    }
    if content.published_at.is_none() {
        content.published_at = candidate.timestamp;
    }

    stats.scrape.record(true);
    debug!(content_id = %content.id, body_len = content.body.len(), "scraped");
    Ok(Some(content))
}

// ---------------------------------------------------------------------------
// Summarize
// ---------------------------------------------------------------------------

/// How the summarize stage ended for one item.
#[derive(Debug, Clone, PartialEq)]
pub enum SummarizeOutcome {
    Summarized,
    /// The summarizer failed and the scraped values were kept.
    Fallback { error: String },
}

/// Rewrite the content through the summarizer, in place.
///
/// Never fails: on error the scraped title and body stay, empty ones are
/// replaced by placeholders, and a warning notification is sent.
#[instrument(skip_all, fields(summarizer = summarizer.name(), content_id = %content.id))]
pub async fn summarize_one(
    summarizer: &dyn Summarizer,
    notifier: &dyn Notifier,
    content: &mut ScrapedContent,
    stats: &mut RunStats,
) -> SummarizeOutcome {
    let result = match serde_json::to_string(&*content) {
        Ok(serialized) => summarizer.summarize(&serialized).await,
        Err(e) => Err(PresslineError::Summarize(format!(
            "failed to serialize content: {e}"
        ))),
    };

    match result {
        Ok(summary) => {
            content.title = summary.title;
            content.body = summary.body;
            content.score = summary.score;
            if !summary.keywords.is_empty() {
                content.metadata.keywords = summary.keywords;
            }
            stats.summarize.record(true);
            debug!("summarized");
            SummarizeOutcome::Summarized
        }
        Err(e) => {
            stats.summarize.record(false);
            warn!(error = %e, "summarization failed, keeping scraped content");

            if content.title.trim().is_empty() {
                content.title = PLACEHOLDER_TITLE.to_string();
                stats.summarize_fallbacks += 1;
            }
            if content.body.trim().is_empty() {
                content.body = PLACEHOLDER_BODY.to_string();
                stats.summarize_fallbacks += 1;
            }

            let error = e.to_string();
            notifier
                .warning(
                    "Summarization failed",
                    &format!("{} ({}): {error}", content.title, content.url),
                )
                .await;
            SummarizeOutcome::Fallback { error }
        }
    }
}

/// Short plain-text summary of a Markdown body, cut at a word boundary.
pub fn derive_digest(body: &str) -> String {
    let text = plain_text(body);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let Some((cut, _)) = text.char_indices().nth(DIGEST_CHARS) else {
        return text;
    };

    let head = &text[..cut];
    let head = match head.rfind(' ') {
        Some(space) if space > 0 => &head[..space],
        _ => head,
    };
    format!("{}…", head.trim_end_matches([',', ';', ':', '.', ' ']))
}

// ---------------------------------------------------------------------------
// Render + cover + publish
// ---------------------------------------------------------------------------

/// Generate a cover, upload it, render the article and publish it.
///
/// Any failure is returned to the caller; there is no fallback.
#[instrument(skip_all, fields(content_id = %content.id))]
pub async fn render_and_publish_one(
    images: &dyn ImageGenerator,
    publisher: &dyn Publisher,
    policy: &CoverPolicy,
    content: &ScrapedContent,
    cover_hint: Option<&str>,
    stats: &mut RunStats,
) -> Result<PublishResult> {
    let result = publish_inner(images, publisher, policy, content, cover_hint).await;

    match &result {
        Ok(published) => stats.publish.record(published.status.is_processed()),
        Err(_) => stats.publish.record(false),
    }
    result
}

async fn publish_inner(
    images: &dyn ImageGenerator,
    publisher: &dyn Publisher,
    policy: &CoverPolicy,
    content: &ScrapedContent,
    cover_hint: Option<&str>,
) -> Result<PublishResult> {
    let digest = derive_digest(&content.body);

    let prompt = cover_prompt(content, cover_hint, &policy.style);
    let cover_url = generate_cover(images, &prompt, policy).await?;
    let media = publisher.upload_image(&cover_url).await?;
    debug!(media_id = %media.media_id, "cover uploaded");

    let article = RenderableArticle::from_content(content, &media.url, digest);
    let document = render(slice::from_ref(&article))?;

    let result = publisher
        .publish(PublishRequest {
            content_id: &article.content_id,
            document: &document,
            title: &article.title,
            digest: &article.digest,
            media: &media,
            author: article.author.as_deref(),
            source_url: &article.source_url,
        })
        .await?;

    info!(status = ?result.status, "publish finished");
    Ok(result)
}
