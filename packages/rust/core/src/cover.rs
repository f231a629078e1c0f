//! Cover image generation: submit a task, then poll it to a terminal state.
//!
//! Polling waits `poll_interval` before each status request, gives up after
//! `max_polls` requests, and the whole exchange runs under `timeout`. Errors
//! while polling are treated as transient and retried within those bounds.

use pressline_services::{ImageDimensions, ImageGenerator, TaskId, TaskStatus};
use pressline_shared::{CoverPolicy, PresslineError, Result, ScrapedContent};
use tracing::{debug, info, instrument, warn};

/// Maximum prompt length sent to the image backend, in characters.
const MAX_PROMPT_CHARS: usize = 600;

/// Generate a cover and return the URL of the produced image.
#[instrument(skip_all, fields(prompt_len = prompt.len()))]
pub async fn generate_cover(
    generator: &dyn ImageGenerator,
    prompt: &str,
    policy: &CoverPolicy,
) -> Result<String> {
    let dims = ImageDimensions {
        width: policy.width,
        height: policy.height,
    };

    let work = async {
        let task = generator.submit(prompt, dims).await.map_err(into_cover_error)?;
        debug!(%task, "cover task submitted");
        poll_until_terminal(generator, &task, policy).await
    };

    match tokio::time::timeout(policy.timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(PresslineError::CoverGeneration(format!(
            "no terminal state within {}s",
            policy.timeout.as_secs_f32()
        ))),
    }
}

async fn poll_until_terminal(
    generator: &dyn ImageGenerator,
    task: &TaskId,
    policy: &CoverPolicy,
) -> Result<String> {
    let mut last_error: Option<String> = None;

    for attempt in 1..=policy.max_polls {
        tokio::time::sleep(policy.poll_interval).await;

        match generator.poll_status(task).await {
            Ok(TaskStatus::Completed {
                output_url: Some(url),
            }) => {
                info!(%task, attempt, "cover ready");
                return Ok(url);
            }
            Ok(TaskStatus::Completed { output_url: None }) => {
                return Err(PresslineError::CoverGeneration(format!(
                    "task {task} completed without an output image"
                )));
            }
            Ok(TaskStatus::Failed { reason }) => {
                return Err(PresslineError::CoverGeneration(format!(
                    "task {task} failed: {}",
                    reason.as_deref().unwrap_or("no reason given")
                )));
            }
            Ok(status) => debug!(%task, attempt, ?status, "cover still in progress"),
            Err(e) => {
                warn!(%task, attempt, error = %e, "cover status poll failed, retrying");
                last_error = Some(e.to_string());
            }
        }
    }

    let suffix = last_error
        .map(|e| format!(" (last error: {e})"))
        .unwrap_or_default();
    Err(PresslineError::CoverGeneration(format!(
        "task {task} not finished after {} polls{suffix}",
        policy.max_polls
    )))
}

fn into_cover_error(e: PresslineError) -> PresslineError {
    match e {
        PresslineError::CoverGeneration(_) => e,
        other => PresslineError::CoverGeneration(other.to_string()),
    }
}

/// Build the image prompt for an article.
///
/// Uses the feed's cover hint when it is descriptive text; image URLs are not
/// useful to a generator and are ignored.
pub fn cover_prompt(content: &ScrapedContent, hint: Option<&str>, style: &str) -> String {
    let mut parts = vec![format!("Cover image for a news article titled \"{}\"", content.title.trim())];

    if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
        if !hint.starts_with("http://") && !hint.starts_with("https://") {
            parts.push(format!("Scene: {hint}"));
        }
    }
    if !content.metadata.keywords.is_empty() {
        parts.push(format!("Themes: {}", content.metadata.keywords.join(", ")));
    }
    if !style.trim().is_empty() {
        parts.push(format!("Style: {}", style.trim()));
    }

    let prompt = parts.join(". ");
    match prompt.char_indices().nth(MAX_PROMPT_CHARS) {
        Some((idx, _)) => prompt[..idx].to_string(),
        None => prompt,
    }
}
