// src/context.rs
//! Application context: owns the collaborators and the scheduler instance.
//! Each context is isolated, so tests build as many as they need.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::analyze::DynAiClient;
use crate::config::{AiConfig, PoolStrategy, RecommendationConfig, SchedulerConfig};
use crate::scheduler::{AlarmService, AnalysisScheduler, Collaborators, TokioAlarms};
use crate::store::{
    MemoryArticleStore, MemoryFeedStore, MemoryProfileStore, MemorySettingsStore,
};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const ENV_DATA_DIR: &str = "SILENT_FEED_DATA_DIR";

#[derive(Clone)]
pub struct AppContext {
    pub collaborators: Collaborators,
    pub scheduler: Arc<AnalysisScheduler>,
}

impl AppContext {
    pub fn new(collaborators: Collaborators, cfg: SchedulerConfig) -> Self {
        let scheduler = Arc::new(AnalysisScheduler::new(cfg, collaborators.clone()));
        Self {
            collaborators,
            scheduler,
        }
    }

    /// Wire in-memory stores, tokio alarms and the given AI client.
    pub fn in_memory(
        cfg: SchedulerConfig,
        stores: MemoryStores,
        alarms: Arc<dyn AlarmService>,
        ai: DynAiClient,
    ) -> Self {
        Self::new(
            Collaborators {
                articles: stores.articles,
                profiles: stores.profiles,
                settings: stores.settings,
                feeds: stores.feeds,
                alarms,
                ai,
            },
            cfg,
        )
    }
}

/// Concrete in-memory stores, kept typed so callers can seed or inspect them.
#[derive(Clone, Debug, Default)]
pub struct MemoryStores {
    pub articles: Arc<MemoryArticleStore>,
    pub profiles: Arc<MemoryProfileStore>,
    pub settings: Arc<MemorySettingsStore>,
    pub feeds: Arc<MemoryFeedStore>,
}

impl MemoryStores {
    /// Seed from `<dir>/{articles,profile,feeds,strategy}.json`; each file is
    /// optional. Without a strategy file a default strategy is installed.
    pub fn load_dir(dir: &Path, ai: AiConfig) -> Result<Self> {
        let articles = match dir.join("articles.json") {
            p if p.exists() => MemoryArticleStore::from_json_file(&p)?,
            _ => MemoryArticleStore::default(),
        };
        let profiles = match dir.join("profile.json") {
            p if p.exists() => MemoryProfileStore::from_json_file(&p)?,
            _ => MemoryProfileStore::default(),
        };
        let feeds = match dir.join("feeds.json") {
            p if p.exists() => MemoryFeedStore::from_json_file(&p)?,
            _ => MemoryFeedStore::default(),
        };
        let strategy = match dir.join("strategy.json") {
            p if p.exists() => {
                let raw = std::fs::read_to_string(&p)
                    .with_context(|| format!("reading {}", p.display()))?;
                let s: PoolStrategy = serde_json::from_str(&raw)
                    .with_context(|| format!("parsing {}", p.display()))?;
                s.validate()
                    .with_context(|| format!("validating {}", p.display()))?;
                s
            }
            _ => PoolStrategy {
                entry_threshold: RecommendationConfig::default().quality_threshold,
                target_pool_size: 30,
            },
        };
        info!(dir = %dir.display(), "memory stores seeded");

        Ok(Self {
            articles: Arc::new(articles),
            profiles: Arc::new(profiles),
            settings: Arc::new(MemorySettingsStore::new(
                RecommendationConfig::default(),
                ai,
                Some(strategy),
            )),
            feeds: Arc::new(feeds),
        })
    }
}

/// Default alarm facility.
pub fn tokio_alarms() -> Arc<dyn AlarmService> {
    Arc::new(TokioAlarms::new())
}
