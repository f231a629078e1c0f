//! Content summarization through an OpenAI-compatible chat endpoint.
//!
//! The model receives the whole scraped record as JSON and must answer with a
//! JSON object `{title, body, score, keywords}`. Markdown code fences around
//! the object are tolerated.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use pressline_shared::{PresslineError, Result, SummarizerConfig, require_secret};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::http_client;

/// System prompt sent with every request.
const SYSTEM_PROMPT: &str = "You are a news editor. You receive one scraped article as JSON. \
Rewrite it as a concise, neutral article for a general audience. \
Answer with a single JSON object and nothing else: \
{\"title\": string, \"body\": string (Markdown, 3 to 8 short paragraphs), \
\"score\": number between 0 and 1 rating newsworthiness, \"keywords\": array of 3 to 6 short strings}.";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Rewritten content returned by a summarizer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Summary {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A backend that rewrites serialized content.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;

    /// Summarize `serialized` (a JSON document describing one article).
    async fn summarize(&self, serialized: &str) -> Result<Summary>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// ChatSummarizer
// ---------------------------------------------------------------------------

/// Summarizer backed by any OpenAI-compatible `chat/completions` API.
pub struct ChatSummarizer {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_input_chars: usize,
}

impl ChatSummarizer {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: &str,
        max_input_chars: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_input_chars,
        })
    }

    /// Build from the `[summarizer]` section; the API key must be set.
    pub fn from_config(config: &SummarizerConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            require_secret(&config.api_key_env)?,
            &config.model,
            config.max_input_chars,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl fmt::Debug for ChatSummarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSummarizer")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, input_len = serialized.len()))]
    async fn summarize(&self, serialized: &str) -> Result<Summary> {
        let input = truncate_chars(serialized, self.max_input_chars);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
            temperature: 0.3,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PresslineError::Summarize(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PresslineError::Summarize(format!(
                "{url}: HTTP {status}: {}",
                truncate_chars(detail.trim(), 200)
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| PresslineError::Summarize(format!("invalid completion response: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PresslineError::Summarize("completion has no content".into()))?;

        debug!(output_len = content.len(), "completion received");
        parse_summary(&content)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse the model answer into a [`Summary`].
pub(crate) fn parse_summary(content: &str) -> Result<Summary> {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex")
    });

    let unfenced = FENCE_RE
        .captures(content)
        .and_then(|c| c.get(1))
        .map_or(content, |m| m.as_str());

    let json = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => {
            return Err(PresslineError::Summarize(
                "completion does not contain a JSON object".into(),
            ));
        }
    };

    let mut summary: Summary = serde_json::from_str(json)
        .map_err(|e| PresslineError::Summarize(format!("malformed summary JSON: {e}")))?;

    summary.title = summary.title.trim().to_string();
    summary.body = summary.body.trim().to_string();
    if summary.title.is_empty() || summary.body.is_empty() {
        return Err(PresslineError::Summarize("summary has an empty title or body".into()));
    }
    summary.score = summary.score.map(|s| s.clamp(0.0, 1.0));
    summary.keywords = summary
        .keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    Ok(summary)
}

/// Cut `text` to at most `max` characters without splitting a code point.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
