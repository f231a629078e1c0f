//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use pressline_core::{ItemStatus, Pipeline, ProgressReporter, RunOutcome};
use pressline_scraper::ScraperRegistry;
use pressline_shared::{
    AppConfig, WorkflowConfig, config_file_path, init_config, load_config, load_config_from,
    optional_secret, validate_credentials,
};
use tracing::info;

use crate::schedule;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Pressline: feed in, articles out.
#[derive(Parser)]
#[command(
    name = "pressline",
    version,
    about = "Turn feed candidates into published articles with summaries and generated covers.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.pressline/pressline.toml).
    #[arg(long, env = "PRESSLINE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Refresh providers, fetch one batch and run it.
    Run {
        /// Apply a scheduled workflow's overrides.
        #[arg(short, long)]
        workflow: Option<String>,

        /// Print the run outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Renew scraper and publisher sessions without running.
    Refresh {
        #[arg(short, long)]
        workflow: Option<String>,
    },

    /// Run on the configured schedule until interrupted.
    Schedule {
        /// Evaluate a single tick and exit.
        #[arg(long)]
        once: bool,
    },

    /// Show configured providers and credential status.
    Providers,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Show resolved configuration.
    Show,
    /// Check that all required credentials are set.
    Check,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pressline=info",
        1 => "pressline=debug",
        _ => "pressline=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run { workflow, json } => cmd_run(config_path, workflow.as_deref(), json).await,
        Command::Refresh { workflow } => cmd_refresh(config_path, workflow.as_deref()).await,
        Command::Schedule { once } => {
            let config = load(config_path)?;
            validate_credentials(&config)?;
            schedule::run_schedule(config, once).await
        }
        Command::Providers => cmd_providers(config_path),
        Command::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(config_path, force),
            ConfigAction::Show => cmd_config_show(config_path),
            ConfigAction::Check => cmd_config_check(config_path),
        },
    }
}

fn load(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

fn find_workflow<'a>(config: &'a AppConfig, name: Option<&str>) -> Result<Option<&'a WorkflowConfig>> {
    let Some(name) = name else {
        return Ok(None);
    };
    config
        .schedule
        .workflows
        .iter()
        .find(|w| w.name == name)
        .map(Some)
        .ok_or_else(|| eyre!("no workflow named '{name}' in [schedule.workflows]"))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, workflow: Option<&str>, json: bool) -> Result<()> {
    let config = load(config_path)?;
    validate_credentials(&config)?;
    let workflow = find_workflow(&config, workflow)?;

    info!(
        workflow = workflow.map(|w| w.name.as_str()).unwrap_or("default"),
        "starting run"
    );

    let progress = Arc::new(CliProgress::new());
    let pipeline = Pipeline::from_config(&config, workflow)?.with_progress(progress.clone());

    let result = async {
        pipeline.refresh().await?;
        pipeline.process().await
    }
    .await;
    progress.clear();
    let outcome = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!();
    println!("  {}", outcome.report.title);
    println!("  Run:       {}", outcome.run_id);
    println!(
        "  Items:     {} attempted, {} succeeded, {} failed",
        outcome.stats.attempted, outcome.stats.succeeded, outcome.stats.failed
    );
    for result in &outcome.results {
        println!(
            "  - {:<10} {}",
            format!("{:?}", result.status).to_lowercase(),
            result.url.as_deref().unwrap_or(&result.content_id)
        );
    }
    println!("  Time:      {:.1}s", outcome.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_refresh(config_path: Option<&Path>, workflow: Option<&str>) -> Result<()> {
    let config = load(config_path)?;
    validate_credentials(&config)?;
    let workflow = find_workflow(&config, workflow)?;

    let pipeline = Pipeline::from_config(&config, workflow)?;
    pipeline.refresh().await?;
    println!("Providers refreshed (scraper: {}).", pipeline.settings().scraper_key);
    Ok(())
}

fn cmd_providers(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;

    let status = |var: &str| {
        if optional_secret(var).is_some() {
            format!("{var} (set)")
        } else {
            format!("{var} (missing)")
        }
    };

    println!("Feed:        {}  key: {}", config.feed.base_url, status(&config.feed.api_key_env));

    match ScraperRegistry::from_config(&config) {
        Ok(registry) => println!(
            "Scrapers:    {}  active: {}",
            registry.tags().join(", "),
            config.run.scraper
        ),
        Err(e) => println!("Scrapers:    unavailable ({e})"),
    }

    println!(
        "Summarizer:  {} @ {}  key: {}",
        config.summarizer.model,
        config.summarizer.base_url,
        status(&config.summarizer.api_key_env)
    );
    println!(
        "Covers:      {} ({}x{})  key: {}",
        config.cover.base_url,
        config.cover.width,
        config.cover.height,
        status(&config.cover.api_key_env)
    );
    println!(
        "Publisher:   {}  auto-publish: {}  key: {}",
        config.publisher.base_url,
        config.publisher.auto_publish,
        status(&config.publisher.api_key_env)
    );
    let notifier = if optional_secret(&config.notifier.webhook_url_env).is_some() {
        "webhook"
    } else {
        "log only"
    };
    println!("Notifier:    {notifier}  ({})", config.notifier.webhook_url_env);

    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let target = match config_path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if target.exists() && !force {
        return Err(eyre!(
            "config already exists at '{}' (use --force to overwrite)",
            target.display()
        ));
    }

    let path = init_config(Some(&target))?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn cmd_config_check(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    validate_credentials(&config)?;
    println!("All required credentials are set.");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
pub(crate) struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    pub(crate) fn clear(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item_started(&self, index: usize, total: usize, title: &str) {
        self.spinner.set_message(format!("[{index}/{total}] {title}"));
    }

    fn item_finished(&self, index: usize, total: usize, status: ItemStatus) {
        let label = match status {
            ItemStatus::Published => "published",
            ItemStatus::Draft => "saved as draft",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Failed => "failed",
        };
        self.spinner.println(format!("  [{index}/{total}] {label}"));
    }

    fn done(&self, _outcome: &RunOutcome) {
        self.spinner.finish_and_clear();
    }
}
