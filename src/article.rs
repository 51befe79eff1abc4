// src/article.rs
//! Article record as stored by the document store, plus the partial-update
//! patch and query predicate the scheduler uses against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::ai_adapter::AnalysisResult;

/// Position of an article in the raw → candidate → recommended lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PoolStatus {
    Raw,
    Candidate,
    AnalyzedNotQualified,
    /// Set by the recommendation side; never written by the scheduler.
    Recommended,
    /// Left the pool for reasons owned by other components.
    Exited,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Raw => "raw",
            PoolStatus::Candidate => "candidate",
            PoolStatus::AnalyzedNotQualified => "analyzed-not-qualified",
            PoolStatus::Recommended => "recommended",
            PoolStatus::Exited => "exited",
        }
    }
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PoolExitReason {
    EmptyContent,
    BelowThreshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    #[serde(default)]
    pub feed_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    pub pool_status: PoolStatus,
    #[serde(default = "default_in_feed")]
    pub in_feed: bool,
    #[serde(default)]
    pub deleted: bool,

    #[serde(default)]
    pub analysis: Option<AnalysisResult>,
    #[serde(default)]
    pub analysis_score: Option<f32>,
    #[serde(default)]
    pub pool_entered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pool_exited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pool_exit_reason: Option<PoolExitReason>,
}

fn default_in_feed() -> bool {
    true
}

impl Article {
    /// Fresh ingested article: `raw`, in its feed, not deleted.
    pub fn new_raw(id: impl Into<String>, feed_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            feed_id: feed_id.into(),
            title: title.into(),
            description: None,
            content: None,
            link: None,
            published_at: None,
            pool_status: PoolStatus::Raw,
            in_feed: true,
            deleted: false,
            analysis: None,
            analysis_score: None,
            pool_entered_at: None,
            pool_exited_at: None,
            pool_exit_reason: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Scoring input: the first non-empty of `content`, `description`, `title`,
    /// trimmed after the choice. A whitespace-only `content` is still chosen
    /// and yields an empty string.
    pub fn scoring_text(&self) -> &str {
        [self.content.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or(self.title.as_str())
            .trim()
    }

    /// Merge the `Some` fields of `patch` into this record.
    pub fn apply(&mut self, patch: ArticlePatch) {
        if let Some(v) = patch.pool_status {
            self.pool_status = v;
        }
        if let Some(v) = patch.in_feed {
            self.in_feed = v;
        }
        if let Some(v) = patch.deleted {
            self.deleted = v;
        }
        if let Some(v) = patch.analysis {
            self.analysis = Some(v);
        }
        if let Some(v) = patch.analysis_score {
            self.analysis_score = Some(v);
        }
        if let Some(v) = patch.pool_entered_at {
            self.pool_entered_at = Some(v);
        }
        if let Some(v) = patch.pool_exited_at {
            self.pool_exited_at = Some(v);
        }
        if let Some(v) = patch.pool_exit_reason {
            self.pool_exit_reason = Some(v);
        }
    }
}

/// Partial field merge for `ArticleStore::update`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_status: Option<PoolStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_feed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_entered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_exited_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_exit_reason: Option<PoolExitReason>,
}

impl ArticlePatch {
    pub fn status(status: PoolStatus) -> Self {
        Self {
            pool_status: Some(status),
            ..Default::default()
        }
    }

    pub fn promoted(now: DateTime<Utc>) -> Self {
        Self {
            pool_status: Some(PoolStatus::Candidate),
            pool_entered_at: Some(now),
            ..Default::default()
        }
    }

    pub fn not_qualified(now: DateTime<Utc>, reason: PoolExitReason) -> Self {
        Self {
            pool_status: Some(PoolStatus::AnalyzedNotQualified),
            pool_exited_at: Some(now),
            pool_exit_reason: Some(reason),
            ..Default::default()
        }
    }

    pub fn scored(analysis: AnalysisResult, score: f32) -> Self {
        Self {
            analysis: Some(analysis),
            analysis_score: Some(score),
            ..Default::default()
        }
    }
}

/// Query predicate understood by every `ArticleStore`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub pool_status: Option<PoolStatus>,
    pub exclude_out_of_feed: bool,
    pub exclude_deleted: bool,
}

impl ArticleFilter {
    /// Unanalyzed articles still in their feed and not soft-deleted.
    pub fn raw_backlog() -> Self {
        Self::live_with_status(PoolStatus::Raw)
    }

    pub fn live_with_status(status: PoolStatus) -> Self {
        Self {
            pool_status: Some(status),
            exclude_out_of_feed: true,
            exclude_deleted: true,
        }
    }

    pub fn matches(&self, a: &Article) -> bool {
        if let Some(s) = self.pool_status {
            if a.pool_status != s {
                return false;
            }
        }
        if self.exclude_out_of_feed && !a.in_feed {
            return false;
        }
        if self.exclude_deleted && a.deleted {
            return false;
        }
        true
    }
}

/// Per-status pool sizes for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub raw: usize,
    pub candidate: usize,
    pub analyzed_not_qualified: usize,
}
