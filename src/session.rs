//! Dashboard session: the current schedule view and how it is refreshed.
//!
//! A reload is `begin` → fetch → `complete`. Every `begin` issues a newer
//! generation; `complete` only applies a result whose generation is still the
//! newest, so a slow response cannot overwrite a fresher one. When the fetch
//! fails the session falls back to a placeholder schedule and raises a notice
//! once per failure streak.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{AuthConfig, DashboardConfig};
use crate::error::{ScheduleError, ScheduleResult};
use crate::schedule::ScheduleModel;
use crate::schedule::stats::{Stats, compute_statistics};
use crate::schedule::years::{Bucket, YearBuckets, YearFilter};
use crate::store::{build_model, parse_task_file};
use crate::types::{PHASE_TYPE, RawId, TaskFile, TaskId, TaskRecord, ValidationPolicy};

/// Notice shown when the schedule could not be loaded.
pub const LOAD_FAILURE_NOTICE: &str =
    "Error loading project data. Please refresh the page or contact support.";

/// Where the session gets its task collection from.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Fetch the whole `{ tasks, links }` document.
    async fn fetch(&self) -> ScheduleResult<TaskFile>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// Fetches `GET <base>/api/tasks` with Basic credentials.
pub struct HttpTaskSource {
    client: reqwest::Client,
    url: String,
    auth: AuthConfig,
}

impl HttpTaskSource {
    pub fn new(base_url: &str, auth: AuthConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/api/tasks", base_url.trim_end_matches('/')),
            auth,
        })
    }
}

#[async_trait]
impl TaskSource for HttpTaskSource {
    async fn fetch(&self) -> ScheduleResult<TaskFile> {
        let response = self
            .client
            .get(&self.url)
            .basic_auth(&self.auth.username, Some(&self.auth.password))
            .send()
            .await
            .map_err(ScheduleError::load_failure)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScheduleError::LoadFailure(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        let body = response.text().await.map_err(ScheduleError::load_failure)?;
        parse_task_file(&body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads the store file directly.
pub struct FileTaskSource {
    path: PathBuf,
}

impl FileTaskSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TaskSource for FileTaskSource {
    async fn fetch(&self) -> ScheduleResult<TaskFile> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ScheduleError::load_failure(format!("{}: {}", self.path.display(), e)))?;
        parse_task_file(&text)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Bounded retry with jittered exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    pub initial_ms: u64,
    pub jitter_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            initial_ms: 0,
            jitter_ms: 0,
            max_ms: 0,
            multiplier: 1.0,
        }
    }
}

impl From<&DashboardConfig> for RetryPolicy {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            retries: config.fetch_retries,
            initial_ms: config.retry_initial_ms,
            jitter_ms: config.retry_jitter_ms,
            max_ms: config.retry_max_ms,
            multiplier: config.retry_multiplier,
        }
    }
}

/// Compute jittered delay for retry.
/// Uses system time nanoseconds for simple jitter without requiring rand crate.
fn compute_jittered_delay(base_ms: u64, jitter_ms: u64) -> Duration {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    // Offset in [0, 2 * jitter_ms), shifted down by jitter_ms
    let jitter_range = jitter_ms.saturating_mul(2);
    let offset = if jitter_range > 0 {
        u64::from(nanos) % jitter_range
    } else {
        0
    };

    Duration::from_millis(base_ms.saturating_add(offset).saturating_sub(jitter_ms))
}

/// Fetch from `source`, retrying per `policy`. Returns the last error.
pub async fn fetch_with_retry(
    source: &dyn TaskSource,
    policy: &RetryPolicy,
) -> ScheduleResult<TaskFile> {
    let mut delay_ms = policy.initial_ms;
    let mut attempt = 0;
    loop {
        match source.fetch().await {
            Ok(file) => return Ok(file),
            Err(e) if attempt < policy.retries => {
                attempt += 1;
                warn!(
                    source = %source.describe(),
                    attempt,
                    error = %e,
                    "Task fetch failed, retrying in {:.1}s",
                    delay_ms as f64 / 1000.0
                );
                tokio::time::sleep(compute_jittered_delay(delay_ms, policy.jitter_ms)).await;
                delay_ms = ((delay_ms as f64 * policy.multiplier) as u64).min(policy.max_ms);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Built-in schedule shown when the real one cannot be loaded.
pub fn placeholder_tasks(today: NaiveDate) -> TaskFile {
    let start_date = today.format(crate::types::DATE_FORMAT).to_string();
    TaskFile {
        tasks: vec![
            TaskRecord {
                id: TaskId::from("placeholder"),
                text: "Project data unavailable".to_string(),
                start_date: start_date.clone(),
                duration: 1,
                progress: Some(0.0),
                task_type: Some(PHASE_TYPE.to_string()),
                priority: None,
                parent: None,
                notes: None,
            },
            TaskRecord {
                id: TaskId::from("placeholder-retry"),
                text: "Retry loading the schedule".to_string(),
                start_date,
                duration: 1,
                progress: Some(0.0),
                task_type: None,
                priority: None,
                parent: Some(RawId::Str("placeholder".to_string())),
                notes: Some("The task store could not be reached.".to_string()),
            },
        ],
        links: Vec::new(),
    }
}

/// A pending reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadTicket {
    generation: u64,
    filter: YearFilter,
}

impl ReloadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn filter(&self) -> YearFilter {
        self.filter
    }
}

/// What `complete` did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The fetched schedule is now shown.
    Loaded,
    /// The fetch or model build failed; placeholder data is shown.
    Fallback,
    /// A newer reload was issued; the result was discarded.
    Stale,
}

/// The dashboard's view state: model, filter, statistics and year buckets.
#[derive(Debug)]
pub struct DashboardSession {
    model: ScheduleModel,
    filter: YearFilter,
    pending_filter: Option<YearFilter>,
    stats: Stats,
    buckets: BTreeMap<TaskId, Bucket>,
    year_buckets: YearBuckets,
    policy: ValidationPolicy,
    notice: Option<String>,
    on_placeholder: bool,
    last_error: Option<ScheduleError>,
    issued: u64,
}

impl DashboardSession {
    pub fn new(year_buckets: YearBuckets, policy: ValidationPolicy) -> Self {
        Self {
            model: ScheduleModel::default(),
            filter: YearFilter::All,
            pending_filter: None,
            stats: Stats::default(),
            buckets: BTreeMap::new(),
            year_buckets,
            policy,
            notice: None,
            on_placeholder: false,
            last_error: None,
            issued: 0,
        }
    }

    pub fn model(&self) -> &ScheduleModel {
        &self.model
    }

    /// Filter of the model currently shown.
    pub fn filter(&self) -> YearFilter {
        self.filter
    }

    /// Filter the next refresh reloads with.
    pub fn next_filter(&self) -> YearFilter {
        self.pending_filter.unwrap_or(self.filter)
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Year bucket annotations for the current model.
    pub fn buckets(&self) -> &BTreeMap<TaskId, Bucket> {
        &self.buckets
    }

    pub fn bucket_of(&self, id: &TaskId) -> Option<&Bucket> {
        self.buckets.get(id)
    }

    pub fn is_placeholder(&self) -> bool {
        self.on_placeholder
    }

    pub fn last_error(&self) -> Option<&ScheduleError> {
        self.last_error.as_ref()
    }

    /// Take the pending user-visible notice, if any.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Select the filter the refresh loop reloads with. `filter()` keeps
    /// reporting the shown model's filter until a reload for it completes.
    pub fn select_filter(&mut self, filter: YearFilter) {
        self.pending_filter = Some(filter);
    }

    /// Start a reload for `filter`.
    pub fn begin(&mut self, filter: YearFilter) -> ReloadTicket {
        self.issued += 1;
        ReloadTicket {
            generation: self.issued,
            filter,
        }
    }

    /// Apply a fetch result, unless a newer reload has been issued since.
    pub fn complete(
        &mut self,
        ticket: ReloadTicket,
        result: ScheduleResult<TaskFile>,
    ) -> ReloadOutcome {
        if ticket.generation != self.issued {
            debug!(
                generation = ticket.generation,
                newest = self.issued,
                "Discarding stale reload"
            );
            return ReloadOutcome::Stale;
        }

        let built = result.and_then(|file| build_model(&file, ticket.filter, self.policy));
        match built {
            Ok(model) => {
                self.install(model, ticket.filter);
                self.on_placeholder = false;
                self.last_error = None;
                info!(
                    filter = %ticket.filter,
                    total = self.stats.total,
                    progress = self.stats.overall_progress_percent,
                    "Schedule loaded"
                );
                ReloadOutcome::Loaded
            }
            Err(e) => {
                error!(filter = %ticket.filter, error = %e, "Schedule load failed, using placeholder data");
                self.fall_back(ticket.filter, e);
                ReloadOutcome::Fallback
            }
        }
    }

    /// Begin, fetch with retries, complete.
    pub async fn reload(
        &mut self,
        source: &dyn TaskSource,
        filter: YearFilter,
        retry: &RetryPolicy,
    ) -> ReloadOutcome {
        let ticket = self.begin(filter);
        let result = fetch_with_retry(source, retry).await;
        self.complete(ticket, result)
    }

    fn fall_back(&mut self, filter: YearFilter, err: ScheduleError) {
        let today = chrono::Local::now().date_naive();
        let placeholder = build_model(&placeholder_tasks(today), YearFilter::All, self.policy)
            .unwrap_or_default();
        self.install(placeholder, filter);
        if !self.on_placeholder {
            self.notice = Some(LOAD_FAILURE_NOTICE.to_string());
        }
        self.on_placeholder = true;
        self.last_error = Some(err);
    }

    fn install(&mut self, model: ScheduleModel, filter: YearFilter) {
        self.stats = compute_statistics(model.each_task());
        self.buckets = self.year_buckets.classify(&model);
        self.model = model;
        self.filter = filter;
        if self.pending_filter == Some(filter) {
            self.pending_filter = None;
        }
    }
}

/// Shortest refresh period; shorter requests are raised to it.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Reload on a fixed interval until `shutdown` resolves. `on_refresh` runs
/// after every reload, including the first.
pub async fn run_refresh_loop<F>(
    session: &mut DashboardSession,
    source: &dyn TaskSource,
    retry: &RetryPolicy,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
    mut on_refresh: F,
) where
    F: FnMut(&mut DashboardSession, ReloadOutcome),
{
    let mut ticker = tokio::time::interval(interval.max(MIN_REFRESH_INTERVAL));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Refresh loop shutting down");
                return;
            }
            _ = ticker.tick() => {
                let filter = session.next_filter();
                let outcome = session.reload(source, filter, retry).await;
                on_refresh(session, outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_builds() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let model = build_model(
            &placeholder_tasks(today),
            YearFilter::All,
            ValidationPolicy::default(),
        )
        .unwrap();
        assert_eq!(model.len(), 2);
        assert_eq!(compute_statistics(model.each_task()).total, 1);
    }

    #[test]
    fn test_jittered_delay_bounds() {
        for _ in 0..20 {
            let d = compute_jittered_delay(1000, 200);
            assert!(d >= Duration::from_millis(800));
            assert!(d <= Duration::from_millis(1200));
        }
        assert_eq!(compute_jittered_delay(0, 0), Duration::ZERO);
    }

    #[test]
    fn test_jittered_delay_extreme_config_saturates() {
        assert_eq!(compute_jittered_delay(u64::MAX, u64::MAX), Duration::ZERO);
        assert_eq!(compute_jittered_delay(10, u64::MAX), Duration::ZERO);
    }

    #[test]
    fn test_selected_filter_waits_for_reload() {
        let mut session = DashboardSession::new(YearBuckets::default(), ValidationPolicy::default());
        session.select_filter(YearFilter::Year(2026));
        assert_eq!(session.filter(), YearFilter::All);
        assert_eq!(session.next_filter(), YearFilter::Year(2026));

        let ticket = session.begin(session.next_filter());
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        session.complete(ticket, Ok(placeholder_tasks(today)));
        assert_eq!(session.filter(), YearFilter::Year(2026));
        assert_eq!(session.next_filter(), YearFilter::Year(2026));
    }

    #[test]
    fn test_begin_issues_increasing_generations() {
        let mut session = DashboardSession::new(YearBuckets::default(), ValidationPolicy::default());
        let a = session.begin(YearFilter::All);
        let b = session.begin(YearFilter::Year(2025));
        assert!(b.generation() > a.generation());
        assert_eq!(b.filter(), YearFilter::Year(2025));
    }
}
