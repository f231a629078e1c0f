//! Error types for Pressline.
//!
//! Library crates use [`PresslineError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Pressline operations.
#[derive(Debug, thiserror::Error)]
pub enum PresslineError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to a provider.
    #[error("network error: {0}")]
    Network(String),

    /// Response body or document could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed candidate, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The feed source could not be reached or returned garbage.
    #[error("feed unavailable: {0}")]
    FeedUnavailable(String),

    /// The feed source answered, but with no usable candidates.
    #[error("feed returned no candidates")]
    FeedEmpty,

    /// A run was started without any candidates.
    #[error("no input: run started with an empty candidate batch")]
    NoInput,

    /// Every item of the run failed before reaching publication.
    #[error("no content processed ({failed} of {attempted} items failed)")]
    NoContentProcessed { attempted: usize, failed: usize },

    /// No scraper registered under the requested routing key.
    #[error("unknown scraper '{tag}'")]
    UnknownScraper { tag: String },

    /// Hard scrape failure (distinct from "no content found").
    #[error("scrape error: {0}")]
    Scrape(String),

    /// Summarization backend error.
    #[error("summarize error: {0}")]
    Summarize(String),

    /// Cover image task failed, timed out, or produced no output.
    #[error("cover generation failed: {0}")]
    CoverGeneration(String),

    /// Template rendering error.
    #[error("render error: {0}")]
    Render(String),

    /// Media upload or publish call failed.
    #[error("publish error: {0}")]
    Publish(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PresslineError>;

impl PresslineError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts a whole run rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FeedUnavailable(_)
                | Self::FeedEmpty
                | Self::NoInput
                | Self::NoContentProcessed { .. }
        )
    }
}
