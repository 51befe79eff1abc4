// src/scheduler/mod.rs
//! Article pool analysis scheduler.
//!
//! Each cycle takes the first raw article of a small batch, analyzes it,
//! scores it against the user profile and moves it to `candidate` or
//! `analyzed-not-qualified`. The next cycle is armed on a named alarm whose
//! delay follows the raw backlog (see [`interval`]).
//!
//! States: stopped → running-idle ⇄ running-analyzing → stopped.

pub mod alarm;
pub mod error;
pub mod interval;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analyze::{
    qualifies, relevance_score, AiClient, AnalysisPurpose, AnalyzeOptions, DynAiClient,
    KeywordAnalyzer,
};
use crate::article::{Article, ArticleFilter, ArticlePatch, PoolExitReason, PoolStatus};
use crate::config::{AiConfig, PoolStrategy, RecommendationConfig, SchedulerConfig, StrategyError};
use crate::profile::UserProfile;
use crate::store::{ArticleStore, FeedStore, ProfileStore, SettingsStore};

pub use alarm::{AlarmService, TokioAlarms};
pub use error::{ErrorDescriptor, SchedulerError};
pub use interval::next_interval;

/// Everything the scheduler calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub articles: Arc<dyn ArticleStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub feeds: Arc<dyn FeedStore>,
    pub alarms: Arc<dyn AlarmService>,
    pub ai: DynAiClient,
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum CycleOutcome {
    /// Another cycle was in flight; nothing ran.
    Busy,
    EmptyBacklog,
    ProfileMissing,
    StrategyMissing,
    /// A collaborator read failed before any article was touched.
    LoadFailed { error: ErrorDescriptor },
    EmptyContent { article_id: String },
    Promoted { article_id: String, score: f32 },
    Rejected { article_id: String, score: f32 },
    /// Analysis or persistence failed; the article was reset to `raw`.
    Failed { article_id: String, error: ErrorDescriptor },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Busy => "busy",
            CycleOutcome::EmptyBacklog => "empty-backlog",
            CycleOutcome::ProfileMissing => "profile-missing",
            CycleOutcome::StrategyMissing => "strategy-missing",
            CycleOutcome::LoadFailed { .. } => "load-failed",
            CycleOutcome::EmptyContent { .. } => "empty-content",
            CycleOutcome::Promoted { .. } => "promoted",
            CycleOutcome::Rejected { .. } => "rejected",
            CycleOutcome::Failed { .. } => "failed",
        }
    }
}

/// Read-only snapshot for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub is_analyzing: bool,
    pub current_interval_secs: u64,
    pub next_run_at: Option<DateTime<Utc>>,
    pub config: SchedulerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    /// Batch length. The single-article path does not consult it.
    pub max_articles: usize,
}

/// Bundle handed to the analysis step.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub articles: Vec<Article>,
    pub profile: UserProfile,
    /// Recommendation config with `quality_threshold` taken from the strategy.
    pub config: RecommendationConfig,
    pub options: AnalysisOptions,
}

impl AnalysisInput {
    pub fn new(articles: Vec<Article>, profile: UserProfile, config: RecommendationConfig) -> Self {
        let options = AnalysisOptions {
            max_articles: articles.len(),
        };
        Self {
            articles,
            profile,
            config,
            options,
        }
    }
}

#[derive(Default)]
struct State {
    running: bool,
    current_interval: Duration,
    next_run_at: Option<DateTime<Utc>>,
    listener: Option<JoinHandle<()>>,
}

/// Releases the in-flight flag on drop.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "scheduler_cycles_total",
            "Analysis cycles by outcome (promoted, rejected, failed, ...)."
        );
        describe_gauge!("scheduler_raw_backlog", "Raw, in-feed, non-deleted articles.");
        describe_gauge!(
            "scheduler_next_interval_secs",
            "Delay chosen for the next analysis cycle."
        );
    });
}

pub struct AnalysisScheduler {
    cfg: SchedulerConfig,
    articles: Arc<dyn ArticleStore>,
    profiles: Arc<dyn ProfileStore>,
    settings: Arc<dyn SettingsStore>,
    feeds: Arc<dyn FeedStore>,
    alarms: Arc<dyn AlarmService>,
    ai: DynAiClient,
    keywords: KeywordAnalyzer,
    analyzing: AtomicBool,
    state: Mutex<State>,
}

impl AnalysisScheduler {
    pub fn new(cfg: SchedulerConfig, c: Collaborators) -> Self {
        ensure_metrics_described();
        Self {
            cfg,
            articles: c.articles,
            profiles: c.profiles,
            settings: c.settings,
            feeds: c.feeds,
            alarms: c.alarms,
            ai: c.ai,
            keywords: KeywordAnalyzer::default(),
            analyzing: AtomicBool::new(false),
            state: Mutex::new(State {
                current_interval: interval::initial_interval(),
                ..Default::default()
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.analyzing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.analyzing))
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().running
    }

    /// Subscribe to alarm fires, run one cycle now, then arm the next alarm.
    /// A second call while running only logs.
    pub async fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        {
            let mut st = self.lock_state();
            if st.running {
                info!(target: "scheduler", "scheduler already running");
                return Ok(());
            }
            st.running = true;
        }

        let rx = match self.alarms.subscribe() {
            Ok(rx) => rx,
            Err(e) => {
                error!(target: "scheduler", error = ?e, "alarm listener registration failed");
                self.lock_state().running = false;
                return Err(SchedulerError::Alarm(e));
            }
        };
        let listener = self.spawn_listener(rx);
        self.lock_state().listener = Some(listener);
        info!(
            target: "scheduler",
            alarm = %self.cfg.alarm_name,
            batch_size = self.cfg.batch_size,
            "scheduler started"
        );

        let outcome = self.run_cycle().await;
        debug!(target: "scheduler", outcome = outcome.label(), "initial cycle done");

        if let Err(e) = self.schedule_next().await {
            error!(target: "scheduler", error = ?e, "arming first alarm failed");
            let listener = {
                let mut st = self.lock_state();
                st.running = false;
                st.next_run_at = None;
                st.listener.take()
            };
            if let Some(h) = listener {
                h.abort();
            }
            return Err(SchedulerError::Alarm(e));
        }
        Ok(())
    }

    /// Cancel the alarm and stop listening. A cycle already in flight finishes
    /// but does not re-arm. Cancellation errors are logged and ignored.
    pub async fn stop(&self) {
        let listener = {
            let mut st = self.lock_state();
            if !st.running {
                debug!(target: "scheduler", "scheduler not running");
                return;
            }
            st.running = false;
            st.next_run_at = None;
            st.listener.take()
        };
        if let Some(h) = listener {
            h.abort();
        }
        match self.alarms.clear(&self.cfg.alarm_name).await {
            Ok(_) => info!(target: "scheduler", "scheduler stopped"),
            Err(e) => warn!(target: "scheduler", error = ?e, "clearing alarm failed; ignored"),
        }
    }

    /// Run one cycle now, outside the alarm schedule.
    pub async fn trigger_manual(&self) -> CycleOutcome {
        info!(target: "scheduler", "manual analysis triggered");
        let outcome = self.run_cycle().await;
        if outcome != CycleOutcome::Busy {
            if let Err(e) = self.schedule_next().await {
                error!(target: "scheduler", error = ?e, "re-arming alarm after manual run failed");
            }
        }
        outcome
    }

    pub fn status(&self) -> SchedulerStatus {
        let st = self.lock_state();
        SchedulerStatus {
            is_running: st.running,
            is_analyzing: self.analyzing.load(Ordering::Acquire),
            current_interval_secs: st.current_interval.as_secs(),
            next_run_at: st.next_run_at,
            config: self.cfg.clone(),
        }
    }

    /// Validate and acknowledge a strategy change. The strategy is read fresh
    /// every cycle, so nothing is cached here; it applies on the next cycle.
    pub fn update_strategy(&self, strategy: PoolStrategy) -> Result<(), StrategyError> {
        strategy.validate()?;
        info!(
            target: "scheduler",
            entry_threshold = strategy.entry_threshold,
            target_pool_size = strategy.target_pool_size,
            "strategy updated; applies on next cycle"
        );
        Ok(())
    }

    fn spawn_listener(self: &Arc<Self>, mut rx: broadcast::Receiver<String>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(name) => {
                        let Some(this) = weak.upgrade() else { break };
                        if name != this.cfg.alarm_name {
                            continue;
                        }
                        // Own task: aborting the listener must not abort a started cycle.
                        tokio::spawn(async move { this.on_alarm().await });
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(target: "scheduler", skipped = n, "alarm listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn on_alarm(&self) {
        if !self.is_running() {
            return;
        }
        debug!(target: "scheduler", "alarm fired");
        let outcome = self.run_cycle().await;
        if outcome == CycleOutcome::Busy {
            return;
        }
        if let Err(e) = self.schedule_next().await {
            error!(target: "scheduler", error = ?e, "re-arming alarm failed");
        }
    }

    /// Arm the alarm with the current interval. No-op when stopped.
    async fn schedule_next(&self) -> anyhow::Result<()> {
        let delay = {
            let st = self.lock_state();
            if !st.running {
                return Ok(());
            }
            st.current_interval
        };
        self.alarms
            .create(&self.cfg.alarm_name, delay)
            .await
            .with_context(|| format!("arming alarm `{}`", self.cfg.alarm_name))?;

        let next = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let mut st = self.lock_state();
        if st.running {
            st.next_run_at = Some(next);
        }
        debug!(target: "scheduler", delay_secs = delay.as_secs(), %next, "next analysis armed");
        Ok(())
    }

    /// Guarded cycle: analyze one article, then recompute the interval.
    async fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = self.try_begin() else {
            debug!(target: "scheduler", "cycle already in flight; skipped");
            counter!("scheduler_cycles_total", "outcome" => "busy").increment(1);
            return CycleOutcome::Busy;
        };

        let outcome = self.analyze_next().await;
        self.refresh_interval().await;

        counter!("scheduler_cycles_total", "outcome" => outcome.label()).increment(1);
        outcome
    }

    async fn refresh_interval(&self) {
        match self.articles.count(&ArticleFilter::raw_backlog()).await {
            Ok(backlog) => {
                let iv = next_interval(backlog);
                self.lock_state().current_interval = iv;
                gauge!("scheduler_raw_backlog").set(backlog as f64);
                gauge!("scheduler_next_interval_secs").set(iv.as_secs() as f64);
                debug!(target: "scheduler", backlog, interval_secs = iv.as_secs(), "interval updated");
            }
            Err(e) => {
                warn!(target: "scheduler", error = ?e, "backlog count failed; keeping interval");
            }
        }
    }

    async fn analyze_next(&self) -> CycleOutcome {
        let batch = match self
            .articles
            .query(&ArticleFilter::raw_backlog(), self.cfg.batch_size)
            .await
        {
            Ok(b) => b,
            Err(e) => return load_failed("raw batch", e),
        };
        if batch.is_empty() {
            info!(target: "scheduler", "no raw articles to analyze");
            return CycleOutcome::EmptyBacklog;
        }

        let profile = match self.profiles.current_profile().await {
            Ok(Some(p)) => p,
            Ok(None) => {
                self.log_profile_not_ready().await;
                return CycleOutcome::ProfileMissing;
            }
            Err(e) => return load_failed("user profile", e),
        };

        let rec = match self.settings.recommendation_config().await {
            Ok(c) => c,
            Err(e) => return load_failed("recommendation config", e),
        };
        let ai_cfg = match self.settings.ai_config().await {
            Ok(c) => c,
            Err(e) => return load_failed("ai config", e),
        };
        let strategy = match self.settings.pool_strategy().await {
            Ok(Some(s)) => s,
            Ok(None) => {
                warn!(target: "scheduler", "no active pool strategy; cycle skipped");
                return CycleOutcome::StrategyMissing;
            }
            Err(e) => return load_failed("pool strategy", e),
        };
        if let Err(e) = strategy.validate() {
            warn!(target: "scheduler", error = %e, "active pool strategy invalid; cycle skipped");
            return CycleOutcome::StrategyMissing;
        }

        let input = AnalysisInput::new(batch, profile, rec.merged_with(&strategy));
        debug!(
            target: "scheduler",
            batch = input.articles.len(),
            max_articles = input.options.max_articles,
            quality_threshold = input.config.quality_threshold,
            "analysis input built"
        );
        let threshold = strategy.entry_threshold;
        let article = &input.articles[0];

        match self.process(article, &input.profile, &ai_cfg, threshold).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let d = ErrorDescriptor::from_anyhow(&e);
                error!(
                    target: "scheduler",
                    article = %article.id,
                    name = %d.name,
                    message = %d.message,
                    chain = ?d.chain,
                    raw = %d.raw,
                    "article analysis failed; resetting to raw"
                );
                if let Err(reset) = self
                    .articles
                    .update(&article.id, ArticlePatch::status(PoolStatus::Raw))
                    .await
                {
                    error!(target: "scheduler", article = %article.id, error = ?reset, "reset to raw failed");
                }
                CycleOutcome::Failed {
                    article_id: article.id.clone(),
                    error: d,
                }
            }
        }
    }

    async fn process(
        &self,
        article: &Article,
        profile: &UserProfile,
        ai_cfg: &AiConfig,
        threshold: f32,
    ) -> anyhow::Result<CycleOutcome> {
        let text = article.scoring_text();
        if text.is_empty() {
            self.articles
                .update(
                    &article.id,
                    ArticlePatch::not_qualified(Utc::now(), PoolExitReason::EmptyContent),
                )
                .await
                .context("marking empty article")?;
            info!(target: "scheduler", article = %article.id, "empty content; not qualified");
            return Ok(CycleOutcome::EmptyContent {
                article_id: article.id.clone(),
            });
        }

        let options = AnalyzeOptions {
            user_profile: profile.view(),
            purpose: AnalysisPurpose::RecommendContent,
        };
        let engine: &dyn AiClient = if ai_cfg.enabled {
            self.ai.as_ref()
        } else {
            &self.keywords
        };
        let result = engine
            .analyze_content(text, &options)
            .await
            .with_context(|| format!("analyzing article {} via {}", article.id, engine.provider_name()))?;

        let score = relevance_score(&result.topic_probabilities, &profile.keywords);
        self.articles
            .update(&article.id, ArticlePatch::scored(result, score))
            .await
            .context("saving analysis")?;

        let now = Utc::now();
        if qualifies(score, threshold) {
            self.articles
                .update(&article.id, ArticlePatch::promoted(now))
                .await
                .context("promoting to candidate")?;
            info!(target: "scheduler", article = %article.id, score, threshold, "promoted to candidate");
            Ok(CycleOutcome::Promoted {
                article_id: article.id.clone(),
                score,
            })
        } else {
            self.articles
                .update(
                    &article.id,
                    ArticlePatch::not_qualified(now, PoolExitReason::BelowThreshold),
                )
                .await
                .context("marking below threshold")?;
            info!(target: "scheduler", article = %article.id, score, threshold, "below threshold");
            Ok(CycleOutcome::Rejected {
                article_id: article.id.clone(),
                score,
            })
        }
    }

    async fn log_profile_not_ready(&self) {
        let subscribed = match self.feeds.feeds().await {
            Ok(f) => f.iter().filter(|f| f.enabled).count(),
            Err(e) => {
                debug!(target: "scheduler", error = ?e, "feed list unavailable");
                0
            }
        };
        if subscribed == 0 {
            info!(target: "scheduler", "cold start: no profile and no subscribed feeds; cycle skipped");
        } else {
            info!(target: "scheduler", feeds = subscribed, "user profile not ready; cycle skipped");
        }
    }
}

fn load_failed(what: &str, e: anyhow::Error) -> CycleOutcome {
    let e = e.context(format!("loading {what}"));
    let d = ErrorDescriptor::from_anyhow(&e);
    warn!(target: "scheduler", name = %d.name, message = %d.message, chain = ?d.chain, "collaborator read failed; cycle skipped");
    CycleOutcome::LoadFailed { error: d }
}
