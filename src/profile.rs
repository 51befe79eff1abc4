// src/profile.rs
//! User interest profile: weighted keywords learned from browsing plus an
//! optional AI-written summary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedKeyword {
    pub word: String,
    pub weight: f32,
}

impl WeightedKeyword {
    pub fn new(word: impl Into<String>, weight: f32) -> Self {
        Self {
            word: word.into(),
            weight,
        }
    }
}

/// Higher-level summary produced by an earlier profiling pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiProfileSummary {
    #[serde(default)]
    pub interests: String,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub avoid_topics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub keywords: Vec<WeightedKeyword>,
    #[serde(default)]
    pub ai_summary: Option<AiProfileSummary>,
}

/// Distilled profile handed to the analysis engine as prompt context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileView {
    pub interests: String,
    pub preferences: Vec<String>,
    pub avoid_topics: Vec<String>,
}

impl UserProfile {
    pub fn with_keywords(keywords: Vec<WeightedKeyword>) -> Self {
        Self {
            keywords,
            ai_summary: None,
        }
    }

    /// `None` unless the profile carries an AI summary with something in it.
    pub fn view(&self) -> Option<UserProfileView> {
        let s = self.ai_summary.as_ref()?;
        let interests = s.interests.trim();
        if interests.is_empty() && s.preferences.is_empty() && s.avoid_topics.is_empty() {
            return None;
        }
        Some(UserProfileView {
            interests: interests.to_string(),
            preferences: s.preferences.clone(),
            avoid_topics: s.avoid_topics.clone(),
        })
    }
}
