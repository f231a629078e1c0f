//! Candidate feed response parser.
//!
//! Accepts either an envelope `{"items": [...]}` or a bare JSON array.
//! Each entry must carry an id, a non-empty title and an absolute http(s) URL;
//! entries that do not are dropped rather than failing the whole feed.

use chrono::{DateTime, Utc};
use pressline_shared::{Candidate, PresslineError, Result};
use serde_json::Value;
use tracing::debug;
use url::Url;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of parsing one feed response.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    /// Well-formed candidates, in feed order.
    pub candidates: Vec<Candidate>,
    /// Number of entries dropped as malformed.
    pub dropped: usize,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a feed response body into candidates.
///
/// A body that is not JSON, or JSON without a list of entries, is an error.
pub(crate) fn parse_feed(body: &str) -> Result<ParsedFeed> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| PresslineError::parse(format!("feed response is not JSON: {e}")))?;

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(PresslineError::parse("feed `items` field is not an array"));
            }
        },
        _ => return Err(PresslineError::parse("feed response is not a list of entries")),
    };

    let mut parsed = ParsedFeed::default();
    for (index, entry) in entries.iter().enumerate() {
        match parse_entry(entry) {
            Ok(candidate) => parsed.candidates.push(candidate),
            Err(e) => {
                debug!(index, error = %e, "dropping malformed feed entry");
                parsed.dropped += 1;
            }
        }
    }

    Ok(parsed)
}

/// Validate one entry and project it into a [`Candidate`].
fn parse_entry(entry: &Value) -> Result<Candidate> {
    let obj = entry
        .as_object()
        .ok_or_else(|| PresslineError::validation("entry is not an object"))?;

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(PresslineError::validation("entry has no id")),
    };

    let title = string_field(obj, "title")
        .ok_or_else(|| PresslineError::validation(format!("entry {id} has no title")))?;

    let raw_url = string_field(obj, "url")
        .ok_or_else(|| PresslineError::validation(format!("entry {id} has no url")))?;
    let url = validate_url(&raw_url)?;

    let timestamp = match obj.get("timestamp") {
        Some(Value::Number(n)) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => string_field(obj, "timestamp").and_then(|raw| parse_timestamp(&raw)),
    };

    let cover_hint = string_field(obj, "cover_hint").or_else(|| string_field(obj, "cover_image"));

    Ok(Candidate {
        id,
        title,
        url,
        author: string_field(obj, "author"),
        timestamp,
        cover_hint,
    })
}

/// Read a trimmed, non-empty string field.
fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Only absolute http(s) URLs can be scraped.
fn validate_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw)
        .map_err(|e| PresslineError::validation(format!("invalid url '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(PresslineError::validation(format!(
            "unsupported url scheme '{other}' in {raw}"
        ))),
    }
}

/// RFC 3339 first, then unix seconds.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
