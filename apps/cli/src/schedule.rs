//! `pressline schedule`: periodic runs inside a daily time window.
//!
//! Each tick picks the first workflow whose `days` list contains today's
//! weekday, refreshes that workflow's pipeline and runs one batch. Failures
//! are logged and the loop carries on.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{Datelike, Local, Timelike, Weekday};
use color_eyre::eyre::Result;
use pressline_core::Pipeline;
use pressline_shared::{AppConfig, WorkflowConfig};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Run the scheduler until Ctrl-C, or for one tick when `once` is set.
pub(crate) async fn run_schedule(config: AppConfig, once: bool) -> Result<()> {
    let period = Duration::from_secs(config.schedule.interval_minutes * 60);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_minutes = config.schedule.interval_minutes,
        window_start = config.schedule.window_start_hour,
        window_end = config.schedule.window_end_hour,
        workflows = config.schedule.workflows.len(),
        "scheduler started"
    );

    let mut pipelines: HashMap<String, Pipeline> = HashMap::new();

    loop {
        tokio::select! {
            _ = async {
                ticker.tick().await;
                tick(&config, &mut pipelines).await;
            } => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping scheduler");
                return Ok(());
            }
        }

        if once {
            return Ok(());
        }
    }
}

async fn tick(config: &AppConfig, pipelines: &mut HashMap<String, Pipeline>) {
    let now = Local::now();
    let schedule = &config.schedule;

    if !in_window(now.hour(), schedule.window_start_hour, schedule.window_end_hour) {
        debug!(hour = now.hour(), "outside run window");
        return;
    }

    let Some(workflow) = select_workflow(&schedule.workflows, now.weekday()) else {
        debug!(weekday = %now.weekday(), "no workflow for today");
        return;
    };

    if !pipelines.contains_key(&workflow.name) {
        match Pipeline::from_config(config, Some(workflow)) {
            Ok(pipeline) => {
                pipelines.insert(workflow.name.clone(), pipeline);
            }
            Err(e) => {
                error!(workflow = %workflow.name, error = %e, "could not build pipeline");
                return;
            }
        }
    }
    let Some(pipeline) = pipelines.get(&workflow.name) else {
        return;
    };

    info!(workflow = %workflow.name, "scheduled run starting");

    if let Err(e) = pipeline.refresh().await {
        warn!(workflow = %workflow.name, error = %e, "provider refresh failed, skipping run");
        pipeline
            .notifier()
            .warning(
                "Provider refresh failed",
                &format!("workflow {}: {e}", workflow.name),
            )
            .await;
        return;
    }

    match pipeline.process().await {
        Ok(outcome) => info!(
            workflow = %workflow.name,
            run_id = %outcome.run_id,
            classification = ?outcome.classification,
            published = outcome.stats.processed,
            "scheduled run finished"
        ),
        // An empty feed or a batch with nothing published is routine on quiet days.
        Err(e) if e.is_fatal() => {
            warn!(workflow = %workflow.name, error = %e, "scheduled run produced nothing")
        }
        Err(e) => error!(workflow = %workflow.name, error = %e, "scheduled run failed"),
    }
}

/// Whether `hour` lies in `[start, end)`.
pub(crate) fn in_window(hour: u32, start: u32, end: u32) -> bool {
    (start..end).contains(&hour)
}

/// Parse a weekday name, short or long, case-insensitive.
pub(crate) fn parse_weekday(name: &str) -> Option<Weekday> {
    name.trim().parse::<Weekday>().ok()
}

/// First workflow scheduled for `today`.
pub(crate) fn select_workflow(workflows: &[WorkflowConfig], today: Weekday) -> Option<&WorkflowConfig> {
    workflows.iter().find(|w| {
        w.days
            .iter()
            .filter_map(|d| parse_weekday(d))
            .any(|d| d == today)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(name: &str, days: &[&str]) -> WorkflowConfig {
        WorkflowConfig {
            name: name.into(),
            days: days.iter().map(|d| d.to_string()).collect(),
            query: None,
            scraper: None,
            max_candidates: None,
        }
    }

    #[test]
    fn window_is_half_open() {
        assert!(in_window(8, 8, 22));
        assert!(in_window(21, 8, 22));
        assert!(!in_window(22, 8, 22));
        assert!(!in_window(7, 8, 22));
    }

    #[test]
    fn weekday_names_parse() {
        assert_eq!(parse_weekday("mon"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("Tuesday"), Some(Weekday::Tue));
        assert_eq!(parse_weekday(" SUN "), Some(Weekday::Sun));
        assert_eq!(parse_weekday("someday"), None);
    }

    #[test]
    fn first_matching_workflow_wins() {
        let workflows = vec![
            workflow("weekday", &["mon", "tue", "wed", "thu", "fri"]),
            workflow("weekend", &["sat", "sunday"]),
            workflow("fallback", &["mon", "sat"]),
        ];

        assert_eq!(select_workflow(&workflows, Weekday::Mon).unwrap().name, "weekday");
        assert_eq!(select_workflow(&workflows, Weekday::Sat).unwrap().name, "weekend");
        assert_eq!(select_workflow(&workflows, Weekday::Sun).unwrap().name, "weekend");
        assert!(select_workflow(&workflows[..1], Weekday::Sun).is_none());
    }

    #[test]
    fn unknown_day_names_are_ignored() {
        let workflows = vec![workflow("odd", &["funday", "wed"])];
        assert!(select_workflow(&workflows, Weekday::Wed).is_some());
        assert!(select_workflow(&workflows, Weekday::Fri).is_none());
    }
}
