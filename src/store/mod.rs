// src/store/mod.rs
//! Collaborator seams: article document store plus the profile, settings and
//! feed stores the scheduler reads each cycle.

pub mod memory;

use anyhow::Result;
use thiserror::Error;

use crate::article::{Article, ArticleFilter, ArticlePatch, PoolStats, PoolStatus};
use crate::config::{AiConfig, PoolStrategy, RecommendationConfig};
use crate::ingest::Feed;
use crate::profile::UserProfile;

pub use memory::{MemoryArticleStore, MemoryFeedStore, MemoryProfileStore, MemorySettingsStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("article `{0}` not found")]
    NotFound(String),
    #[error("article `{0}` already exists")]
    Duplicate(String),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "StoreError::NotFound",
            StoreError::Duplicate(_) => "StoreError::Duplicate",
        }
    }
}

#[async_trait::async_trait]
pub trait ArticleStore: Send + Sync {
    /// Up to `limit` matching articles in the store's default order.
    async fn query(&self, filter: &ArticleFilter, limit: usize) -> Result<Vec<Article>>;
    async fn count(&self, filter: &ArticleFilter) -> Result<usize>;
    /// Partial field merge; fails with `StoreError::NotFound` for unknown ids.
    async fn update(&self, id: &str, patch: ArticlePatch) -> Result<()>;
    async fn insert(&self, article: Article) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Article>>;
    async fn list_by_feed(&self, feed_id: &str) -> Result<Vec<Article>>;

    async fn pool_stats(&self) -> Result<PoolStats> {
        Ok(PoolStats {
            raw: self.count(&ArticleFilter::raw_backlog()).await?,
            candidate: self
                .count(&ArticleFilter::live_with_status(PoolStatus::Candidate))
                .await?,
            analyzed_not_qualified: self
                .count(&ArticleFilter::live_with_status(PoolStatus::AnalyzedNotQualified))
                .await?,
        })
    }
}

#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn current_profile(&self) -> Result<Option<UserProfile>>;
}

#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn recommendation_config(&self) -> Result<RecommendationConfig>;
    async fn ai_config(&self) -> Result<AiConfig>;
    async fn pool_strategy(&self) -> Result<Option<PoolStrategy>>;
    async fn set_pool_strategy(&self, strategy: PoolStrategy) -> Result<()>;
}

#[async_trait::async_trait]
pub trait FeedStore: Send + Sync {
    async fn feeds(&self) -> Result<Vec<Feed>>;
}
