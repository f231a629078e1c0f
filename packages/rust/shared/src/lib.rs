//! Shared types, error model, and configuration for Pressline.
//!
//! This crate is the foundation depended on by all other Pressline crates.
//! It provides:
//! - [`PresslineError`]: the unified error type
//! - Domain types ([`Candidate`], [`ScrapedContent`], [`RenderableArticle`], [`PublishResult`], [`RunId`])
//! - Configuration ([`AppConfig`], [`RunSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CoverConfig, CoverPolicy, FeedConfig, NotifierConfig, PublisherConfig, RunConfig,
    RunSettings, ScheduleConfig, ScraperConfig, SummarizerConfig, WorkflowConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, optional_secret,
    require_secret, validate_credentials,
};
pub use error::{PresslineError, Result};
pub use types::{
    Candidate, ContentMetadata, PublishResult, PublishStatus, RenderableArticle, RunId,
    ScrapedContent, derive_content_id,
};
