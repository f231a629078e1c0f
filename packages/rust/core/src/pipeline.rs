//! Run orchestrator: feed → scrape → summarize → cover → publish → report.
//!
//! Items are processed one at a time in feed order. Each item runs inside its
//! own error boundary, so a failure in one item is recorded and notified but
//! never aborts its siblings. A run ends in exactly one terminal outcome:
//! a [`RunOutcome`] classified by the reporter, or a fatal error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use pressline_feed::{FeedOptions, FeedSource, HttpFeedSource};
use pressline_scraper::{Scraper, ScraperRegistry};
use pressline_services::{
    ChatSummarizer, HttpImageGenerator, HttpPublisher, ImageGenerator, Notifier, Publisher,
    Summarizer, notifier_from_config,
};
use pressline_shared::{
    AppConfig, Candidate, PresslineError, PublishResult, PublishStatus, Result, RunId, RunSettings,
    WorkflowConfig,
};

use crate::report::{RunClassification, RunReport, build_report, dispatch};
use crate::stages::{
    SummarizeOutcome, fetch_candidates, render_and_publish_one, scrape_one, summarize_one,
};
use crate::stats::RunStats;

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Adapter instances shared by every item and every run of a pipeline.
#[derive(Clone)]
pub struct Providers {
    pub feed: Arc<dyn FeedSource>,
    pub scrapers: ScraperRegistry,
    pub summarizer: Arc<dyn Summarizer>,
    pub images: Arc<dyn ImageGenerator>,
    pub publisher: Arc<dyn Publisher>,
    pub notifier: Arc<dyn Notifier>,
}

impl Providers {
    /// Build the bundled HTTP adapters from config.
    ///
    /// `workflow` may override the feed query.
    pub fn from_config(config: &AppConfig, workflow: Option<&WorkflowConfig>) -> Result<Self> {
        let limit = workflow
            .and_then(|w| w.max_candidates)
            .unwrap_or(config.run.max_candidates);
        let feed_opts = FeedOptions::from_config(&config.feed, limit)
            .with_query(workflow.and_then(|w| w.query.clone()));

        Ok(Self {
            feed: Arc::new(HttpFeedSource::new(feed_opts)?),
            scrapers: ScraperRegistry::from_config(config)?,
            summarizer: Arc::new(ChatSummarizer::from_config(&config.summarizer)?),
            images: Arc::new(HttpImageGenerator::from_config(&config.cover)?),
            publisher: Arc::new(HttpPublisher::from_config(&config.publisher)?),
            notifier: notifier_from_config(&config.notifier)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Final state of one item, as shown to progress reporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Published,
    Draft,
    /// The scraper found nothing to publish.
    Skipped,
    Failed,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before an item's sub-pipeline starts. `index` is 1-based.
    fn item_started(&self, index: usize, total: usize, title: &str);
    /// Called after an item's sub-pipeline settles.
    fn item_finished(&self, index: usize, total: usize, status: ItemStatus);
    /// Called when a run completes with an outcome.
    fn done(&self, outcome: &RunOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item_started(&self, _index: usize, _total: usize, _title: &str) {}
    fn item_finished(&self, _index: usize, _total: usize, _status: ItemStatus) {}
    fn done(&self, _outcome: &RunOutcome) {}
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a run that processed at least one item.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub classification: RunClassification,
    pub report: RunReport,
    /// Publish results in candidate order.
    pub results: Vec<PublishResult>,
    pub stats: RunStats,
    pub elapsed: Duration,
}

enum ItemResult {
    Skipped,
    Finished {
        result: PublishResult,
        summarized: bool,
    },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The run orchestrator. Adapters are resolved once at construction.
pub struct Pipeline {
    providers: Providers,
    settings: RunSettings,
    scraper: Arc<dyn Scraper>,
    progress: Arc<dyn ProgressReporter>,
}

impl Pipeline {
    /// Create a pipeline; fails if `settings.scraper_key` is not registered.
    pub fn new(providers: Providers, settings: RunSettings) -> Result<Self> {
        let scraper = providers.scrapers.get(&settings.scraper_key)?;
        Ok(Self {
            providers,
            settings,
            scraper,
            progress: Arc::new(SilentProgress),
        })
    }

    /// Build a pipeline with the bundled HTTP adapters.
    pub fn from_config(config: &AppConfig, workflow: Option<&WorkflowConfig>) -> Result<Self> {
        let settings = match workflow {
            Some(w) => RunSettings::for_workflow(config, w),
            None => RunSettings::from(config),
        };
        Self::new(Providers::from_config(config, workflow)?, settings)
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.providers.notifier.as_ref()
    }

    /// Renew scraper and publisher sessions. Called once before processing.
    #[instrument(skip_all, fields(scraper = self.scraper.name(), publisher = self.providers.publisher.name()))]
    pub async fn refresh(&self) -> Result<()> {
        self.scraper.refresh().await?;
        self.providers.publisher.refresh().await?;
        debug!("providers refreshed");
        Ok(())
    }

    /// Fetch a batch from the feed and run it.
    ///
    /// Fatal errors are notified, then returned to the caller.
    #[instrument(skip_all, fields(feed = self.providers.feed.name()))]
    pub async fn process(&self) -> Result<RunOutcome> {
        self.check_balance().await;

        self.progress.phase("Fetching candidates");
        let candidates =
            match fetch_candidates(self.providers.feed.as_ref(), self.settings.max_candidates).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(error = %e, "run aborted before processing");
                    self.notifier().error("Run aborted", &e.to_string()).await;
                    return Err(e);
                }
            };

        self.run_once(candidates).await
    }

    /// Run one batch of candidates to a terminal outcome.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn run_once(&self, candidates: Vec<Candidate>) -> Result<RunOutcome> {
        let start = Instant::now();
        let run_id = RunId::new();
        let notifier = self.notifier();

        if candidates.is_empty() {
            let err = PresslineError::NoInput;
            notifier.error("Run aborted", &err.to_string()).await;
            return Err(err);
        }

        info!(%run_id, count = candidates.len(), "starting run");
        self.progress.phase("Processing candidates");

        let total = candidates.len();
        let mut stats = RunStats::default();
        let mut results = Vec::with_capacity(total);

        for (i, candidate) in candidates.iter().enumerate() {
            let index = i + 1;
            self.progress.item_started(index, total, &candidate.title);
            stats.begin_item();

            let status = match self.process_item(candidate, &mut stats).await {
                Ok(ItemResult::Finished { result, summarized }) => {
                    debug!(id = %candidate.id, summarized, "item published");
                    let status = match result.status {
                        PublishStatus::Published => ItemStatus::Published,
                        PublishStatus::Draft => ItemStatus::Draft,
                        PublishStatus::Failed => ItemStatus::Failed,
                    };
                    if result.status.is_processed() {
                        stats.item_processed();
                    } else {
                        stats.item_failed();
                        let reason = result.error.as_deref().unwrap_or("publisher reported failure");
                        let body = format!("{} ({}): {reason}", candidate.title, candidate.url);
                        notifier.warning("Publish failed", &body).await;
                    }
                    results.push(result);
                    status
                }
                Ok(ItemResult::Skipped) => {
                    stats.item_failed();
                    notifier
                        .warning(
                            "Item skipped",
                            &format!("{} ({}): no content found", candidate.title, candidate.url),
                        )
                        .await;
                    ItemStatus::Skipped
                }
                Err(e) => {
                    stats.item_failed();
                    warn!(id = %candidate.id, url = %candidate.url, error = %e, "item failed");
                    notifier
                        .warning(
                            "Item failed",
                            &format!("{} ({}): {e}", candidate.title, candidate.url),
                        )
                        .await;
                    ItemStatus::Failed
                }
            };

            debug_assert_eq!(stats.in_flight(), 0, "item {index} left unsettled");
            info!(index, total, id = %candidate.id, ?status, "item finished");
            self.progress.item_finished(index, total, status);
        }

        if stats.processed == 0 {
            let err = PresslineError::NoContentProcessed {
                attempted: stats.attempted,
                failed: stats.failed,
            };
            warn!(%run_id, "no content processed");
            self.settle().await;
            notifier.error("Run failed", &err.to_string()).await;
            return Err(err);
        }

        let publish_ok = results.iter().filter(|r| r.status.is_processed()).count();
        let publish_failed = results.len() - publish_ok;

        self.settle().await;
        info!(
            %run_id,
            attempted = stats.attempted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            publish_ok,
            publish_failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run complete"
        );

        let report = build_report(&run_id, &stats, publish_ok, publish_failed);
        self.settle().await;
        dispatch(&report, notifier).await;

        let outcome = RunOutcome {
            run_id,
            classification: report.classification,
            report,
            results,
            stats,
            elapsed: start.elapsed(),
        };
        self.progress.done(&outcome);
        Ok(outcome)
    }

    async fn process_item(&self, candidate: &Candidate, stats: &mut RunStats) -> Result<ItemResult> {
        let Some(mut content) = scrape_one(self.scraper.as_ref(), candidate, stats).await? else {
            return Ok(ItemResult::Skipped);
        };

        let summary = summarize_one(
            self.providers.summarizer.as_ref(),
            self.notifier(),
            &mut content,
            stats,
        )
        .await;

        let result = render_and_publish_one(
            self.providers.images.as_ref(),
            self.providers.publisher.as_ref(),
            &self.settings.cover,
            &content,
            candidate.cover_hint.as_deref(),
            stats,
        )
        .await?;

        Ok(ItemResult::Finished {
            result,
            summarized: summary == SummarizeOutcome::Summarized,
        })
    }

    /// Advisory credit check. Never blocks the run.
    async fn check_balance(&self) {
        let Some(threshold) = self.settings.low_balance_threshold else {
            return;
        };

        match self.providers.images.remaining_credits().await {
            Ok(Some(balance)) if balance < threshold => {
                warn!(balance, threshold, "image credit balance is low");
                self.notifier()
                    .warning(
                        "Low image credit balance",
                        &format!("{balance:.2} credits left (threshold {threshold:.2})"),
                    )
                    .await;
            }
            Ok(balance) => debug!(?balance, "image credit balance ok"),
            Err(e) => warn!(error = %e, "could not read image credit balance"),
        }
    }

    /// Let buffered log output drain before the run's closing lines.
    async fn settle(&self) {
        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }
    }
}
