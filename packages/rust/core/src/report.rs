//! Run reporter: classify a finished run and build its terminal notification.

use serde::Serialize;
use tracing::info;

use pressline_services::{Notifier, NotifyLevel};
use pressline_shared::RunId;

use crate::stats::RunStats;

/// Terminal classification of a run that processed at least one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunClassification {
    CleanSuccess,
    PartialFailure,
}

impl RunClassification {
    pub fn level(&self) -> NotifyLevel {
        match self {
            Self::CleanSuccess => NotifyLevel::Success,
            Self::PartialFailure => NotifyLevel::Warning,
        }
    }
}

/// Human-readable summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub classification: RunClassification,
    pub title: String,
    pub body: String,
}

/// Build the report for a run from its stats and publish counts.
///
/// A run is clean only with no failed items and no failed publications.
/// Summarizer fallbacks are listed but do not change the classification.
pub fn build_report(
    run_id: &RunId,
    stats: &RunStats,
    publish_ok: usize,
    publish_failed: usize,
) -> RunReport {
    let classification = if stats.failed == 0 && publish_failed == 0 {
        RunClassification::CleanSuccess
    } else {
        RunClassification::PartialFailure
    };

    let title = match classification {
        RunClassification::CleanSuccess => format!("Run complete: {publish_ok} published"),
        RunClassification::PartialFailure => format!(
            "Run finished with failures: {} of {} items failed",
            stats.failed, stats.attempted
        ),
    };

    let mut lines = vec![
        format!("run {run_id}"),
        format!(
            "items: {} attempted, {} succeeded, {} failed",
            stats.attempted, stats.succeeded, stats.failed
        ),
        format!("publish: {publish_ok} ok, {publish_failed} failed"),
        format!(
            "stages: scrape {}/{}, summarize {}/{}, publish {}/{}",
            stats.scrape.ok,
            stats.scrape.total(),
            stats.summarize.ok,
            stats.summarize.total(),
            stats.publish.ok,
            stats.publish.total()
        ),
    ];
    if stats.summarize.failed > 0 {
        lines.push(format!(
            "{} item(s) published without summarization ({} placeholder field(s))",
            stats.summarize.failed, stats.summarize_fallbacks
        ));
    }

    RunReport {
        classification,
        title,
        body: lines.join("\n"),
    }
}

/// Send the single terminal notification for a report.
pub async fn dispatch(report: &RunReport, notifier: &dyn Notifier) {
    info!(classification = ?report.classification, "dispatching run report");
    notifier
        .notify(report.classification.level(), &report.title, &report.body)
        .await;
}
