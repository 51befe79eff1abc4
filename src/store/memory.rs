// src/store/memory.rs
//! In-memory stores. The binary seeds them from JSON files; tests build them
//! directly.

use std::path::Path;
use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};

use super::{ArticleStore, FeedStore, ProfileStore, SettingsStore, StoreError};
use crate::article::{Article, ArticleFilter, ArticlePatch};
use crate::config::{AiConfig, PoolStrategy, RecommendationConfig};
use crate::ingest::Feed;
use crate::profile::UserProfile;

fn poisoned() -> anyhow::Error {
    anyhow!("store lock poisoned")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))
}

/// Articles kept in insertion order, which is the default query order.
#[derive(Debug, Default)]
pub struct MemoryArticleStore {
    inner: RwLock<Vec<Article>>,
}

impl MemoryArticleStore {
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            inner: RwLock::new(articles),
        }
    }

    /// Load a JSON array of articles.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Ok(Self::new(read_json(path)?))
    }

    pub fn snapshot(&self) -> Vec<Article> {
        self.inner.read().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn query(&self, filter: &ArticleFilter, limit: usize) -> Result<Vec<Article>> {
        let g = self.inner.read().map_err(|_| poisoned())?;
        Ok(g.iter().filter(|a| filter.matches(a)).take(limit).cloned().collect())
    }

    async fn count(&self, filter: &ArticleFilter) -> Result<usize> {
        let g = self.inner.read().map_err(|_| poisoned())?;
        Ok(g.iter().filter(|a| filter.matches(a)).count())
    }

    async fn update(&self, id: &str, patch: ArticlePatch) -> Result<()> {
        let mut g = self.inner.write().map_err(|_| poisoned())?;
        let a = g
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        a.apply(patch);
        Ok(())
    }

    async fn insert(&self, article: Article) -> Result<()> {
        let mut g = self.inner.write().map_err(|_| poisoned())?;
        if g.iter().any(|a| a.id == article.id) {
            return Err(StoreError::Duplicate(article.id).into());
        }
        g.push(article);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Article>> {
        let g = self.inner.read().map_err(|_| poisoned())?;
        Ok(g.iter().find(|a| a.id == id).cloned())
    }

    async fn list_by_feed(&self, feed_id: &str) -> Result<Vec<Article>> {
        let g = self.inner.read().map_err(|_| poisoned())?;
        Ok(g.iter().filter(|a| a.feed_id == feed_id).cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    inner: RwLock<Option<UserProfile>>,
}

impl MemoryProfileStore {
    pub fn new(profile: Option<UserProfile>) -> Self {
        Self {
            inner: RwLock::new(profile),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        Ok(Self::new(Some(read_json(path)?)))
    }

    pub fn set(&self, profile: Option<UserProfile>) {
        if let Ok(mut g) = self.inner.write() {
            *g = profile;
        }
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn current_profile(&self) -> Result<Option<UserProfile>> {
        Ok(self.inner.read().map_err(|_| poisoned())?.clone())
    }
}

#[derive(Debug, Default)]
struct Settings {
    recommendation: RecommendationConfig,
    ai: AiConfig,
    strategy: Option<PoolStrategy>,
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: RwLock<Settings>,
}

impl MemorySettingsStore {
    pub fn new(
        recommendation: RecommendationConfig,
        ai: AiConfig,
        strategy: Option<PoolStrategy>,
    ) -> Self {
        Self {
            inner: RwLock::new(Settings {
                recommendation,
                ai,
                strategy,
            }),
        }
    }

    pub fn set_ai_config(&self, ai: AiConfig) {
        if let Ok(mut g) = self.inner.write() {
            g.ai = ai;
        }
    }

    pub fn clear_strategy(&self) {
        if let Ok(mut g) = self.inner.write() {
            g.strategy = None;
        }
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn recommendation_config(&self) -> Result<RecommendationConfig> {
        Ok(self.inner.read().map_err(|_| poisoned())?.recommendation.clone())
    }

    async fn ai_config(&self) -> Result<AiConfig> {
        Ok(self.inner.read().map_err(|_| poisoned())?.ai.clone())
    }

    async fn pool_strategy(&self) -> Result<Option<PoolStrategy>> {
        Ok(self.inner.read().map_err(|_| poisoned())?.strategy)
    }

    async fn set_pool_strategy(&self, strategy: PoolStrategy) -> Result<()> {
        self.inner.write().map_err(|_| poisoned())?.strategy = Some(strategy);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryFeedStore {
    inner: RwLock<Vec<Feed>>,
}

impl MemoryFeedStore {
    pub fn new(feeds: Vec<Feed>) -> Self {
        Self {
            inner: RwLock::new(feeds),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        Ok(Self::new(read_json(path)?))
    }
}

#[async_trait::async_trait]
impl FeedStore for MemoryFeedStore {
    async fn feeds(&self) -> Result<Vec<Feed>> {
        Ok(self.inner.read().map_err(|_| poisoned())?.clone())
    }
}
