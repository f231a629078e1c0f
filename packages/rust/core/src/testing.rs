//! In-memory providers for orchestrator tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use pressline_feed::FeedSource;
use pressline_scraper::{Scraper, ScraperRegistry};
use pressline_services::{
    ImageDimensions, ImageGenerator, MediaReference, Notifier, NotifyLevel, PublishRequest,
    Publisher, Summarizer, Summary, TaskId, TaskStatus,
};
use pressline_shared::{
    Candidate, ContentMetadata, CoverPolicy, PresslineError, PublishResult, PublishStatus, Result,
    RunSettings, ScrapedContent,
};

use crate::pipeline::{Pipeline, Providers};

pub fn candidate(id: &str) -> Candidate {
    Candidate {
        id: id.to_string(),
        title: format!("Story {id}"),
        url: format!("https://news.example.com/{id}"),
        author: None,
        timestamp: None,
        cover_hint: None,
    }
}

/// Candidates "1" through `n`.
pub fn candidates(n: usize) -> Vec<Candidate> {
    (1..=n).map(|i| candidate(&i.to_string())).collect()
}

pub fn content(id: &str) -> ScrapedContent {
    ScrapedContent {
        id: id.to_string(),
        title: format!("Story {id}"),
        body: format!("Body of story {id}.\n\nA second paragraph with more detail."),
        url: format!("https://news.example.com/{id}"),
        published_at: None,
        metadata: ContentMetadata::default(),
        score: None,
    }
}

pub fn fast_cover_policy() -> CoverPolicy {
    CoverPolicy {
        width: 900,
        height: 383,
        style: "test".into(),
        poll_interval: Duration::from_millis(1),
        max_polls: 5,
        timeout: Duration::from_secs(2),
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A full set of fakes; every stage succeeds unless a field is replaced.
pub struct Harness {
    pub feed: Arc<FakeFeed>,
    pub scraper: Arc<FakeScraper>,
    pub summarizer: Arc<FakeSummarizer>,
    pub images: Arc<FakeImageGenerator>,
    pub publisher: Arc<FakePublisher>,
    pub notifier: Arc<RecordingNotifier>,
    pub settings: RunSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            feed: Arc::new(FakeFeed::with(candidates(3))),
            scraper: Arc::new(FakeScraper::new()),
            summarizer: Arc::new(FakeSummarizer::ok()),
            images: Arc::new(FakeImageGenerator::new(ImageBehavior::CompleteAfter(2))),
            publisher: Arc::new(FakePublisher::new()),
            notifier: Arc::new(RecordingNotifier::default()),
            settings: RunSettings {
                max_candidates: 5,
                scraper_key: FakeScraper::NAME.into(),
                settle_delay: Duration::ZERO,
                low_balance_threshold: Some(10.0),
                cover: fast_cover_policy(),
            },
        }
    }

    pub fn providers(&self) -> Providers {
        let mut scrapers = ScraperRegistry::new();
        scrapers.register(self.scraper.clone());

        Providers {
            feed: self.feed.clone(),
            scrapers,
            summarizer: self.summarizer.clone(),
            images: self.images.clone(),
            publisher: self.publisher.clone(),
            notifier: self.notifier.clone(),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.providers(), self.settings.clone()).unwrap()
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

pub struct FakeFeed {
    candidates: Option<Vec<Candidate>>,
}

impl FakeFeed {
    pub fn with(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: Some(candidates),
        }
    }

    pub fn unavailable() -> Self {
        Self { candidates: None }
    }
}

#[async_trait]
impl FeedSource for FakeFeed {
    fn name(&self) -> &str {
        "fake-feed"
    }

    async fn get_candidates(&self) -> Result<Vec<Candidate>> {
        self.candidates
            .clone()
            .ok_or_else(|| PresslineError::FeedUnavailable("connection refused".into()))
    }
}

// ---------------------------------------------------------------------------
// Scraper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum ScrapeBehavior {
    Empty,
    Fail,
}

/// Scrapes `content(id)` for `https://news.example.com/{id}` unless told otherwise.
#[derive(Default)]
pub struct FakeScraper {
    behaviors: HashMap<String, ScrapeBehavior>,
    calls: Mutex<Vec<String>>,
    refreshes: AtomicUsize,
}

impl FakeScraper {
    pub const NAME: &'static str = "fake";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, url: &str, behavior: ScrapeBehavior) -> Self {
        self.behaviors.insert(url.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for FakeScraper {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn scrape(&self, url: &str) -> Result<Vec<ScrapedContent>> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.behaviors.get(url) {
            Some(ScrapeBehavior::Empty) => Ok(Vec::new()),
            Some(ScrapeBehavior::Fail) => Err(PresslineError::Scrape(format!("{url}: HTTP 500"))),
            None => {
                let id = url.rsplit('/').next().unwrap_or(url);
                Ok(vec![content(id)])
            }
        }
    }

    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

pub struct FakeSummarizer {
    fail: bool,
}

impl FakeSummarizer {
    pub fn ok() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    fn name(&self) -> &str {
        "fake-summarizer"
    }

    async fn summarize(&self, serialized: &str) -> Result<Summary> {
        if self.fail {
            return Err(PresslineError::Summarize("model timed out".into()));
        }
        let content: ScrapedContent = serde_json::from_str(serialized)
            .map_err(|e| PresslineError::Summarize(format!("bad payload: {e}")))?;
        Ok(Summary {
            title: format!("Rewritten: {}", content.title),
            body: format!("Rewritten body of story {}.", content.id),
            score: Some(0.8),
            keywords: vec!["rewritten".into()],
        })
    }
}

// ---------------------------------------------------------------------------
// Image generator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum ImageBehavior {
    /// Pending until the nth poll of a task, then completed.
    CompleteAfter(usize),
    /// The first n polls of a task error, then it completes.
    FlakyThenComplete(usize),
    NeverFinishes,
    Fails,
    CompletesWithoutOutput,
    SubmitFails,
}

#[derive(Default)]
struct ImageState {
    submits: usize,
    polls: usize,
    polls_this_task: usize,
}

pub struct FakeImageGenerator {
    behavior: ImageBehavior,
    /// 1-based submit number whose task never finishes.
    stuck_task: Option<usize>,
    credits: f64,
    state: Mutex<ImageState>,
}

impl FakeImageGenerator {
    pub fn new(behavior: ImageBehavior) -> Self {
        Self {
            behavior,
            stuck_task: None,
            credits: 100.0,
            state: Mutex::new(ImageState::default()),
        }
    }

    /// Completes every task except the nth one submitted.
    pub fn never_finishing_for(task: usize) -> Self {
        let mut generator = Self::new(ImageBehavior::CompleteAfter(1));
        generator.stuck_task = Some(task);
        generator
    }

    pub fn with_credits(mut self, credits: f64) -> Self {
        self.credits = credits;
        self
    }

    pub fn polls(&self) -> usize {
        self.state.lock().unwrap().polls
    }
}

#[async_trait]
impl ImageGenerator for FakeImageGenerator {
    fn name(&self) -> &str {
        "fake-images"
    }

    async fn submit(&self, _prompt: &str, _dims: ImageDimensions) -> Result<TaskId> {
        if matches!(self.behavior, ImageBehavior::SubmitFails) {
            return Err(PresslineError::Network("image backend unreachable".into()));
        }
        let mut state = self.state.lock().unwrap();
        state.submits += 1;
        state.polls_this_task = 0;
        Ok(TaskId(format!("task-{}", state.submits)))
    }

    async fn poll_status(&self, task: &TaskId) -> Result<TaskStatus> {
        let (submits, n) = {
            let mut state = self.state.lock().unwrap();
            state.polls += 1;
            state.polls_this_task += 1;
            (state.submits, state.polls_this_task)
        };

        if self.stuck_task == Some(submits) {
            return Ok(TaskStatus::Running);
        }

        let done = TaskStatus::Completed {
            output_url: Some(format!("https://img.example.com/{task}.png")),
        };
        Ok(match self.behavior {
            ImageBehavior::CompleteAfter(after) if n >= after => done,
            ImageBehavior::CompleteAfter(_) => TaskStatus::Pending,
            ImageBehavior::FlakyThenComplete(errors) if n <= errors => {
                return Err(PresslineError::Network("status endpoint unavailable".into()));
            }
            ImageBehavior::FlakyThenComplete(_) => done,
            ImageBehavior::NeverFinishes | ImageBehavior::SubmitFails => TaskStatus::Running,
            ImageBehavior::Fails => TaskStatus::Failed {
                reason: Some("content policy violation".into()),
            },
            ImageBehavior::CompletesWithoutOutput => TaskStatus::Completed { output_url: None },
        })
    }

    async fn remaining_credits(&self) -> Result<Option<f64>> {
        Ok(Some(self.credits))
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// What the fake publisher received for one article.
#[derive(Debug, Clone)]
pub struct PublishedArticle {
    pub content_id: String,
    pub title: String,
    pub digest: String,
    pub html: String,
}

pub struct FakePublisher {
    status: PublishStatus,
    overrides: HashMap<String, PublishStatus>,
    failure_reason: Option<String>,
    /// 1-based upload attempt that is rejected.
    fail_upload_on: Option<usize>,
    rejected: HashSet<String>,
    media_scheme: &'static str,
    uploads: AtomicUsize,
    refreshes: AtomicUsize,
    published: Mutex<Vec<PublishedArticle>>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self {
            status: PublishStatus::Published,
            overrides: HashMap::new(),
            failure_reason: None,
            fail_upload_on: None,
            rejected: HashSet::new(),
            media_scheme: "https",
            uploads: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn with_status(mut self, status: PublishStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_status_for(mut self, content_id: &str, status: PublishStatus) -> Self {
        self.overrides.insert(content_id.to_string(), status);
        self
    }

    /// Reason reported alongside a `Failed` status.
    pub fn with_failure_reason(mut self, reason: &str) -> Self {
        self.failure_reason = Some(reason.to_string());
        self
    }

    pub fn fail_upload_on(mut self, attempt: usize) -> Self {
        self.fail_upload_on = Some(attempt);
        self
    }

    /// Reject the publish call itself for `content_id`.
    pub fn fail_publish_for(mut self, content_id: &str) -> Self {
        self.rejected.insert(content_id.to_string());
        self
    }

    /// Hand back media URLs the renderer will not accept.
    pub fn with_unrenderable_media(mut self) -> Self {
        self.media_scheme = "ftp";
        self
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<PublishedArticle> {
        self.published.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    fn name(&self) -> &str {
        "fake-publisher"
    }

    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upload_image(&self, _source_url: &str) -> Result<MediaReference> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_upload_on == Some(n) {
            return Err(PresslineError::Publish(format!("upload {n}: media rejected")));
        }
        Ok(MediaReference {
            media_id: format!("m-{n}"),
            url: format!("{}://media.example.com/m-{n}.png", self.media_scheme),
        })
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<PublishResult> {
        if self.rejected.contains(request.content_id) {
            return Err(PresslineError::Publish(format!(
                "{}: HTTP 500 Internal Server Error",
                request.content_id
            )));
        }

        let status = self
            .overrides
            .get(request.content_id)
            .copied()
            .unwrap_or(self.status);

        self.published.lock().unwrap().push(PublishedArticle {
            content_id: request.content_id.to_string(),
            title: request.title.to_string(),
            digest: request.digest.to_string(),
            html: request.document.html.clone(),
        });

        let id = request.content_id;
        Ok(PublishResult {
            status,
            content_id: id.to_string(),
            article_id: (status == PublishStatus::Published).then(|| format!("a-{id}")),
            draft_id: (status == PublishStatus::Draft).then(|| format!("d-{id}")),
            url: (status == PublishStatus::Published)
                .then(|| format!("https://pub.example.com/a-{id}")),
            error: (status == PublishStatus::Failed)
                .then(|| self.failure_reason.clone())
                .flatten(),
        })
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(NotifyLevel, String, String)>>,
}

impl RecordingNotifier {
    pub fn levels(&self) -> Vec<NotifyLevel> {
        self.sent.lock().unwrap().iter().map(|(l, _, _)| *l).collect()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t, _)| t.clone()).collect()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, _, b)| b.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, level: NotifyLevel, title: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((level, title.to_string(), body.to_string()));
    }
}
