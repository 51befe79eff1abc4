// src/config/recommendation.rs
//! Recommendation tunables and the pool strategy document.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_QUALITY_THRESHOLD: f32 = 0.6;
pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationConfig {
    /// Minimum relevance for recommendation. Overridden per cycle by the
    /// strategy's entry threshold.
    pub quality_threshold: f32,
    pub max_recommendations: usize,
    /// Label of the analysis engine the UI selected ("remote" | "keyword").
    #[serde(default)]
    pub analysis_engine: String,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            max_recommendations: DEFAULT_MAX_RECOMMENDATIONS,
            analysis_engine: "remote".to_string(),
        }
    }
}

impl RecommendationConfig {
    /// Copy with `quality_threshold` taken from the strategy's entry threshold.
    pub fn merged_with(&self, strategy: &PoolStrategy) -> Self {
        Self {
            quality_threshold: strategy.entry_threshold,
            ..self.clone()
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StrategyError {
    #[error("entry threshold must be a finite number in [0, 1], got {0}")]
    EntryThreshold(f32),
    #[error("target pool size must be at least 1")]
    TargetPoolSize,
}

/// Active pool strategy. `target_pool_size` is carried for the recommendation
/// side; the scheduler reads it but does not enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStrategy {
    pub entry_threshold: f32,
    pub target_pool_size: usize,
}

impl PoolStrategy {
    pub fn new(entry_threshold: f32, target_pool_size: usize) -> Result<Self, StrategyError> {
        let s = Self {
            entry_threshold,
            target_pool_size,
        };
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        if !self.entry_threshold.is_finite() || !(0.0..=1.0).contains(&self.entry_threshold) {
            return Err(StrategyError::EntryThreshold(self.entry_threshold));
        }
        if self.target_pool_size == 0 {
            return Err(StrategyError::TargetPoolSize);
        }
        Ok(())
    }
}
