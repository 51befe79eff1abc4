// tests/common/mod.rs
//
// Shared fakes for the integration tests: a recording alarm service, a
// scripted AI client and a scheduler harness over the in-memory stores.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use silent_feed::analyze::ai_adapter::{AiError, AiFuture, AnalysisResult, AnalyzeOptions};
use silent_feed::analyze::AiClient;
use silent_feed::article::{Article, ArticleFilter, ArticlePatch};
use silent_feed::config::{AiConfig, PoolStrategy, RecommendationConfig, SchedulerConfig};
use silent_feed::context::{AppContext, MemoryStores};
use silent_feed::profile::{UserProfile, WeightedKeyword};
use silent_feed::scheduler::{AlarmService, Collaborators};
use silent_feed::store::{
    ArticleStore, MemoryArticleStore, MemoryFeedStore, MemoryProfileStore, MemorySettingsStore,
    SettingsStore,
};
use silent_feed::AnalysisScheduler;

/// Records every alarm call; each operation can be made to fail.
pub struct FakeAlarms {
    tx: broadcast::Sender<String>,
    pub created: Mutex<Vec<(String, Duration)>>,
    pub cleared: AtomicUsize,
    pub subscribed: AtomicUsize,
    pub fail_subscribe: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_clear: AtomicBool,
}

impl FakeAlarms {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(8);
        Arc::new(Self {
            tx,
            created: Mutex::new(Vec::new()),
            cleared: AtomicUsize::new(0),
            subscribed: AtomicUsize::new(0),
            fail_subscribe: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fail_clear: AtomicBool::new(false),
        })
    }

    /// Deliver a fire event as if the alarm elapsed.
    pub fn fire(&self, name: &str) {
        let _ = self.tx.send(name.to_string());
    }

    pub fn created(&self) -> Vec<(String, Duration)> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlarmService for FakeAlarms {
    async fn create(&self, name: &str, delay: Duration) -> Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(anyhow!("alarm create refused"));
        }
        self.created.lock().unwrap().push((name.to_string(), delay));
        Ok(())
    }

    async fn clear(&self, _name: &str) -> Result<bool> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(anyhow!("alarm clear refused"));
        }
        Ok(true)
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<String>> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(anyhow!("listener registration refused"));
        }
        self.subscribed.fetch_add(1, Ordering::SeqCst);
        Ok(self.tx.subscribe())
    }
}

/// AI client returning a fixed result (or failing), counting calls.
/// With a gate set, each call signals `entered` and waits for the gate.
pub struct ScriptedAi {
    result: Option<AnalysisResult>,
    pub calls: AtomicUsize,
    pub entered: Arc<Notify>,
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedAi {
    pub fn topics(pairs: &[(&str, f32)]) -> Arc<Self> {
        Arc::new(Self {
            result: Some(AnalysisResult::from_topics(pairs.iter().map(|(k, v)| (*k, *v)))),
            calls: AtomicUsize::new(0),
            entered: Arc::new(Notify::new()),
            gate: None,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: None,
            calls: AtomicUsize::new(0),
            entered: Arc::new(Notify::new()),
            gate: None,
        })
    }

    pub fn gated(pairs: &[(&str, f32)], gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            result: Some(AnalysisResult::from_topics(pairs.iter().map(|(k, v)| (*k, *v)))),
            calls: AtomicUsize::new(0),
            entered: Arc::new(Notify::new()),
            gate: Some(gate),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AiClient for ScriptedAi {
    fn analyze_content<'a>(&'a self, _text: &'a str, _options: &'a AnalyzeOptions) -> AiFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.result {
                Some(r) => {
                    let mut out = r.clone();
                    out.provider = "scripted".to_string();
                    Ok(out)
                }
                None => Err(AiError::Status(503)),
            }
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

pub fn profile(pairs: &[(&str, f32)]) -> UserProfile {
    UserProfile::with_keywords(pairs.iter().map(|(w, x)| WeightedKeyword::new(*w, *x)).collect())
}

pub fn enabled_ai() -> AiConfig {
    AiConfig {
        enabled: true,
        provider: "openai".to_string(),
        ..Default::default()
    }
}

pub struct Harness {
    pub scheduler: Arc<AnalysisScheduler>,
    pub ctx: AppContext,
    pub stores: MemoryStores,
    pub alarms: Arc<FakeAlarms>,
}

pub struct Setup {
    pub articles: Vec<Article>,
    pub profile: Option<UserProfile>,
    pub strategy: Option<PoolStrategy>,
    pub ai_config: AiConfig,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            articles: Vec::new(),
            profile: Some(profile(&[("AI", 0.9)])),
            strategy: Some(PoolStrategy {
                entry_threshold: 0.6,
                target_pool_size: 30,
            }),
            ai_config: enabled_ai(),
        }
    }
}

pub fn harness(setup: Setup, ai: Arc<dyn AiClient>) -> Harness {
    let stores = MemoryStores {
        articles: Arc::new(MemoryArticleStore::new(setup.articles)),
        profiles: Arc::new(MemoryProfileStore::new(setup.profile)),
        settings: Arc::new(MemorySettingsStore::new(
            RecommendationConfig::default(),
            setup.ai_config,
            setup.strategy,
        )),
        feeds: Default::default(),
    };
    let alarms = FakeAlarms::new();
    let ctx = AppContext::in_memory(
        SchedulerConfig::default(),
        stores.clone(),
        alarms.clone(),
        ai,
    );
    Harness {
        scheduler: ctx.scheduler.clone(),
        ctx,
        stores,
        alarms,
    }
}

/// `n` raw articles with content, ids `a0..a{n-1}`.
pub fn raw_articles(n: usize) -> Vec<Article> {
    (0..n)
        .map(|i| Article::new_raw(format!("a{i}"), "feed", format!("title {i}")).with_content("AI news"))
        .collect()
}

/// Article store that fails chosen `update`/`insert` calls and delegates the rest.
pub struct FlakyArticles {
    pub inner: MemoryArticleStore,
    updates: AtomicUsize,
    /// 1-based index of the `update` call that fails; 0 disables.
    fail_update_at: AtomicUsize,
    /// Inserting this article id fails.
    fail_insert_id: Mutex<Option<String>>,
}

impl FlakyArticles {
    pub fn new(articles: Vec<Article>) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryArticleStore::new(articles),
            updates: AtomicUsize::new(0),
            fail_update_at: AtomicUsize::new(0),
            fail_insert_id: Mutex::new(None),
        })
    }

    pub fn fail_update_at(&self, n: usize) {
        self.fail_update_at.store(n, Ordering::SeqCst);
    }

    pub fn fail_insert_of(&self, id: &str) {
        *self.fail_insert_id.lock().unwrap() = Some(id.to_string());
    }
}

#[async_trait]
impl ArticleStore for FlakyArticles {
    async fn query(&self, filter: &ArticleFilter, limit: usize) -> Result<Vec<Article>> {
        self.inner.query(filter, limit).await
    }

    async fn count(&self, filter: &ArticleFilter) -> Result<usize> {
        self.inner.count(filter).await
    }

    async fn update(&self, id: &str, patch: ArticlePatch) -> Result<()> {
        let n = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_update_at.load(Ordering::SeqCst) {
            return Err(anyhow!("write #{n} to `{id}` rejected"));
        }
        self.inner.update(id, patch).await
    }

    async fn insert(&self, article: Article) -> Result<()> {
        if self.fail_insert_id.lock().unwrap().as_deref() == Some(article.id.as_str()) {
            return Err(anyhow!("insert of `{}` rejected", article.id));
        }
        self.inner.insert(article).await
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        self.inner.get(id).await
    }

    async fn list_by_feed(&self, feed_id: &str) -> Result<Vec<Article>> {
        self.inner.list_by_feed(feed_id).await
    }
}

/// Settings store whose AI config read always fails.
pub struct BrokenAiSettings(pub MemorySettingsStore);

#[async_trait]
impl SettingsStore for BrokenAiSettings {
    async fn recommendation_config(&self) -> Result<RecommendationConfig> {
        self.0.recommendation_config().await
    }

    async fn ai_config(&self) -> Result<AiConfig> {
        Err(anyhow!("settings backend unavailable"))
    }

    async fn pool_strategy(&self) -> Result<Option<PoolStrategy>> {
        self.0.pool_strategy().await
    }

    async fn set_pool_strategy(&self, strategy: PoolStrategy) -> Result<()> {
        self.0.set_pool_strategy(strategy).await
    }
}

/// Scheduler over caller-supplied article and settings stores.
pub fn scheduler_with(
    articles: Arc<dyn ArticleStore>,
    settings: Arc<dyn SettingsStore>,
    ai: Arc<dyn AiClient>,
) -> Arc<AnalysisScheduler> {
    let collaborators = Collaborators {
        articles,
        profiles: Arc::new(MemoryProfileStore::new(Some(profile(&[("AI", 0.9)])))),
        settings,
        feeds: Arc::new(MemoryFeedStore::default()),
        alarms: FakeAlarms::new(),
        ai,
    };
    AppContext::new(collaborators, SchedulerConfig::default()).scheduler
}

pub fn default_settings() -> MemorySettingsStore {
    MemorySettingsStore::new(
        RecommendationConfig::default(),
        enabled_ai(),
        Some(PoolStrategy {
            entry_threshold: 0.6,
            target_pool_size: 30,
        }),
    )
}
