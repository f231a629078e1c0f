//! Application configuration for Pressline.
//!
//! User config lives at `~/.pressline/pressline.toml`.
//! Secrets are never stored in the file: each provider section names the
//! environment variable that holds its key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PresslineError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pressline.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pressline";

// ---------------------------------------------------------------------------
// Config structs (matching pressline.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub scraper: ScraperConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(default)]
    pub cover: CoverConfig,

    #[serde(default)]
    pub publisher: PublisherConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of candidates consumed per run.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Routing key of the scraper used in the batch path.
    #[serde(default = "default_scraper_key")]
    pub scraper: String,

    /// Pause before the final summary and the terminal notification.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Warn when image credits drop below this value (0 disables the check).
    #[serde(default = "default_low_balance_threshold")]
    pub low_balance_threshold: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            scraper: default_scraper_key(),
            settle_delay_ms: default_settle_delay_ms(),
            low_balance_threshold: default_low_balance_threshold(),
        }
    }
}

fn default_max_candidates() -> usize {
    5
}
fn default_scraper_key() -> String {
    "html".into()
}
fn default_settle_delay_ms() -> u64 {
    500
}
fn default_low_balance_threshold() -> f64 {
    10.0
}

/// `[feed]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the candidate feed API.
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,

    /// Name of the env var holding the feed API key.
    #[serde(default = "default_feed_key_env")]
    pub api_key_env: String,

    /// Optional query/category forwarded to the feed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_base_url(),
            api_key_env: default_feed_key_env(),
            query: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_feed_base_url() -> String {
    "http://localhost:8080/api".into()
}
fn default_feed_key_env() -> String {
    "PRESSLINE_FEED_KEY".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[scraper]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Base URL of the reader API; the `reader` backend is only registered when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reader_base_url: Option<String>,

    /// Name of the env var holding the reader API key.
    #[serde(default = "default_reader_key_env")]
    pub reader_api_key_env: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            reader_base_url: None,
            reader_api_key_env: default_reader_key_env(),
        }
    }
}

fn default_reader_key_env() -> String {
    "PRESSLINE_READER_KEY".into()
}

/// `[summarizer]` section (any OpenAI-compatible chat endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_summarizer_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Serialized content longer than this is truncated before sending.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    #[serde(default = "default_summarizer_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: default_summarizer_base_url(),
            api_key_env: default_summarizer_key_env(),
            model: default_model(),
            max_input_chars: default_max_input_chars(),
            timeout_secs: default_summarizer_timeout_secs(),
        }
    }
}

fn default_summarizer_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_summarizer_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_max_input_chars() -> usize {
    12_000
}
fn default_summarizer_timeout_secs() -> u64 {
    120
}

/// `[cover]` section: image generation backend and polling contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverConfig {
    #[serde(default = "default_cover_base_url")]
    pub base_url: String,

    #[serde(default = "default_cover_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_cover_width")]
    pub width: u32,

    #[serde(default = "default_cover_height")]
    pub height: u32,

    /// Appended to every cover prompt.
    #[serde(default = "default_cover_style")]
    pub style: String,

    /// Fixed delay between two status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of status polls per task.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Overall ceiling for submit + polling.
    #[serde(default = "default_cover_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            base_url: default_cover_base_url(),
            api_key_env: default_cover_key_env(),
            width: default_cover_width(),
            height: default_cover_height(),
            style: default_cover_style(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            timeout_secs: default_cover_timeout_secs(),
        }
    }
}

fn default_cover_base_url() -> String {
    "http://localhost:8081/v1".into()
}
fn default_cover_key_env() -> String {
    "PRESSLINE_IMAGE_KEY".into()
}
fn default_cover_width() -> u32 {
    900
}
fn default_cover_height() -> u32 {
    383
}
fn default_cover_style() -> String {
    "editorial illustration, clean composition, no text".into()
}
fn default_poll_interval_ms() -> u64 {
    3_000
}
fn default_max_polls() -> u32 {
    40
}
fn default_cover_timeout_secs() -> u64 {
    180
}

/// `[publisher]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    #[serde(default = "default_publisher_base_url")]
    pub base_url: String,

    #[serde(default = "default_publisher_key_env")]
    pub api_key_env: String,

    /// Publish immediately (`true`) or leave the article as a draft.
    #[serde(default = "default_true")]
    pub auto_publish: bool,

    /// Byline used when the content carries no author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_author: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            base_url: default_publisher_base_url(),
            api_key_env: default_publisher_key_env(),
            auto_publish: true,
            default_author: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_publisher_base_url() -> String {
    "http://localhost:8082/v1".into()
}
fn default_publisher_key_env() -> String {
    "PRESSLINE_PUBLISHER_KEY".into()
}
fn default_true() -> bool {
    true
}

/// `[notifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Env var holding the webhook URL; notifications only go to the log when unset.
    #[serde(default = "default_webhook_env")]
    pub webhook_url_env: String,

    #[serde(default = "default_notifier_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url_env: default_webhook_env(),
            timeout_secs: default_notifier_timeout_secs(),
        }
    }
}

fn default_webhook_env() -> String {
    "PRESSLINE_WEBHOOK_URL".into()
}
fn default_notifier_timeout_secs() -> u64 {
    10
}

/// `[schedule]` section, used by `pressline schedule`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// First local hour (inclusive) in which runs may start.
    #[serde(default = "default_window_start")]
    pub window_start_hour: u32,

    /// Local hour (exclusive) after which no run starts.
    #[serde(default = "default_window_end")]
    pub window_end_hour: u32,

    #[serde(default = "default_workflows")]
    pub workflows: Vec<WorkflowConfig>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            window_start_hour: default_window_start(),
            window_end_hour: default_window_end(),
            workflows: default_workflows(),
        }
    }
}

fn default_interval_minutes() -> u64 {
    60
}
fn default_window_start() -> u32 {
    8
}
fn default_window_end() -> u32 {
    22
}
fn default_workflows() -> Vec<WorkflowConfig> {
    vec![WorkflowConfig {
        name: "daily".into(),
        days: ["mon", "tue", "wed", "thu", "fri", "sat", "sun"]
            .iter()
            .map(|d| d.to_string())
            .collect(),
        query: None,
        scraper: None,
        max_candidates: None,
    }]
}

/// `[[schedule.workflows]]` entry: a per-day variant of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,
    /// Weekday names (`mon`, `tuesday`, ...) on which this workflow runs.
    pub days: Vec<String>,
    /// Overrides `feed.query`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Overrides `run.scraper`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraper: Option<String>,
    /// Overrides `run.max_candidates`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_candidates: Option<usize>,
}

// ---------------------------------------------------------------------------
// Run settings (runtime, merged from config + workflow overrides)
// ---------------------------------------------------------------------------

/// Cover polling contract in runtime units.
#[derive(Debug, Clone)]
pub struct CoverPolicy {
    pub width: u32,
    pub height: u32,
    pub style: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub timeout: Duration,
}

impl From<&CoverConfig> for CoverPolicy {
    fn from(config: &CoverConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            style: config.style.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Runtime settings for one pipeline instance.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Bounded-batch cap on candidates per run.
    pub max_candidates: usize,
    /// Routing key into the scraper registry.
    pub scraper_key: String,
    pub settle_delay: Duration,
    /// `None` disables the balance check.
    pub low_balance_threshold: Option<f64>,
    pub cover: CoverPolicy,
}

impl From<&AppConfig> for RunSettings {
    fn from(config: &AppConfig) -> Self {
        let threshold = config.run.low_balance_threshold;
        Self {
            max_candidates: config.run.max_candidates,
            scraper_key: config.run.scraper.clone(),
            settle_delay: Duration::from_millis(config.run.settle_delay_ms),
            low_balance_threshold: (threshold > 0.0).then_some(threshold),
            cover: CoverPolicy::from(&config.cover),
        }
    }
}

impl RunSettings {
    /// Settings for a scheduled workflow, applying its overrides.
    pub fn for_workflow(config: &AppConfig, workflow: &WorkflowConfig) -> Self {
        let mut settings = Self::from(config);
        if let Some(scraper) = &workflow.scraper {
            settings.scraper_key = scraper.clone();
        }
        if let Some(max) = workflow.max_candidates {
            settings.max_candidates = max;
        }
        settings
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pressline/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PresslineError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pressline/pressline.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PresslineError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PresslineError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    validate_config(&config)?;
    Ok(config)
}

/// Write a default config file to `path` (or the default location).
/// Returns the path to the created file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| PresslineError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PresslineError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PresslineError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Sanity-check values that serde cannot express.
fn validate_config(config: &AppConfig) -> Result<()> {
    if config.run.max_candidates == 0 {
        return Err(PresslineError::config("run.max_candidates must be at least 1"));
    }
    if config.cover.max_polls == 0 {
        return Err(PresslineError::config("cover.max_polls must be at least 1"));
    }
    let schedule = &config.schedule;
    if schedule.window_start_hour > 23 || schedule.window_end_hour > 24 {
        return Err(PresslineError::config(
            "schedule window hours must be within 0..=24",
        ));
    }
    if schedule.window_start_hour >= schedule.window_end_hour {
        return Err(PresslineError::config(format!(
            "schedule window is empty ({}..{})",
            schedule.window_start_hour, schedule.window_end_hour
        )));
    }
    if schedule.interval_minutes == 0 {
        return Err(PresslineError::config("schedule.interval_minutes must be at least 1"));
    }
    if let Some(workflow) = schedule
        .workflows
        .iter()
        .find(|w| w.max_candidates == Some(0))
    {
        return Err(PresslineError::config(format!(
            "workflow '{}': max_candidates must be at least 1",
            workflow.name
        )));
    }
    Ok(())
}

/// Read a secret from the named env var; error if it is unset or empty.
pub fn require_secret(var_name: &str) -> Result<String> {
    optional_secret(var_name).ok_or_else(|| {
        PresslineError::config(format!(
            "credential not found. Set the {var_name} environment variable."
        ))
    })
}

/// Read a secret from the named env var, treating empty as unset.
pub fn optional_secret(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

/// Check that every required provider credential is present.
pub fn validate_credentials(config: &AppConfig) -> Result<()> {
    let mut required = vec![
        &config.feed.api_key_env,
        &config.summarizer.api_key_env,
        &config.cover.api_key_env,
        &config.publisher.api_key_env,
    ];
    if config.scraper.reader_base_url.is_some() {
        required.push(&config.scraper.reader_api_key_env);
    }

    let missing: Vec<&str> = required
        .into_iter()
        .filter(|var| optional_secret(var).is_none())
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PresslineError::config(format!(
            "missing credentials: set {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_candidates"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.run.max_candidates, 5);
        assert_eq!(parsed.run.scraper, "html");
        assert_eq!(parsed.schedule.workflows.len(), 1);
    }

    #[test]
    fn config_with_workflows() {
        let toml_str = r#"
[run]
max_candidates = 3

[[schedule.workflows]]
name = "weekday-tech"
days = ["mon", "tue", "wed"]
query = "technology"
scraper = "reader"

[[schedule.workflows]]
name = "weekend"
days = ["sat", "sun"]
max_candidates = 1
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.run.max_candidates, 3);
        assert_eq!(config.schedule.workflows.len(), 2);
        assert_eq!(config.schedule.workflows[0].query.as_deref(), Some("technology"));

        let weekend = RunSettings::for_workflow(&config, &config.schedule.workflows[1]);
        assert_eq!(weekend.max_candidates, 1);
        assert_eq!(weekend.scraper_key, "html");

        let tech = RunSettings::for_workflow(&config, &config.schedule.workflows[0]);
        assert_eq!(tech.scraper_key, "reader");
        assert_eq!(tech.max_candidates, 3);
    }

    #[test]
    fn run_settings_from_app_config() {
        let mut app = AppConfig::default();
        let settings = RunSettings::from(&app);
        assert_eq!(settings.max_candidates, 5);
        assert_eq!(settings.settle_delay, Duration::from_millis(500));
        assert_eq!(settings.cover.poll_interval, Duration::from_secs(3));
        assert_eq!(settings.low_balance_threshold, Some(10.0));

        app.run.low_balance_threshold = 0.0;
        assert!(RunSettings::from(&app).low_balance_threshold.is_none());
    }

    #[test]
    fn rejects_empty_schedule_window() {
        let mut config = AppConfig::default();
        config.schedule.window_start_hour = 20;
        config.schedule.window_end_hour = 8;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_batch_cap() {
        let mut config = AppConfig::default();
        config.run.max_candidates = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_candidates"));
    }

    #[test]
    fn rejects_zero_workflow_batch_cap() {
        let toml_str = r#"
[[schedule.workflows]]
name = "weekend"
days = ["sat", "sun"]
max_candidates = 0
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("workflow 'weekend'"));
        assert!(err.to_string().contains("max_candidates"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("pressline-config-{}", uuid::Uuid::now_v7()));
        let path = dir.join("pressline.toml");
        init_config(Some(&path)).expect("init config");

        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.cover.width, 900);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn credential_validation() {
        let mut config = AppConfig::default();
        // Unique env var names to avoid interfering with other tests
        config.feed.api_key_env = "PL_TEST_NONEXISTENT_FEED_12345".into();
        config.summarizer.api_key_env = "PL_TEST_NONEXISTENT_LLM_12345".into();
        let err = validate_credentials(&config).unwrap_err();
        assert!(err.to_string().contains("PL_TEST_NONEXISTENT_FEED_12345"));
        assert!(err.to_string().contains("PL_TEST_NONEXISTENT_LLM_12345"));
    }
}
