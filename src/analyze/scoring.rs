//! Relevance scoring of an analysis result against the user's weighted keywords.
//!
//! score = Σ max_weight(matches(topic)) * p(topic)   over topics with p > 0.2
//!         ---------------------------------------
//!                 Σ p(topic)                       over all topics
//!
//! clamped to at most 1.0. No topics at all gives a neutral 0.3.

use std::collections::BTreeMap;

use crate::profile::WeightedKeyword;

/// Topics at or below this probability never contribute.
pub const MIN_TOPIC_PROBABILITY: f32 = 0.2;
/// Score used when the engine returned no topic mass.
pub const NO_TOPIC_SCORE: f32 = 0.3;

/// Case-insensitive substring match in either direction. Blank words never match.
pub fn keyword_matches(topic: &str, word: &str) -> bool {
    let word = word.trim().to_lowercase();
    if word.is_empty() {
        return false;
    }
    let topic = topic.trim().to_lowercase();
    if topic.is_empty() {
        return false;
    }
    topic.contains(&word) || word.contains(&topic)
}

/// Highest weight among keywords matching `topic`, if any match.
fn best_weight(topic: &str, keywords: &[WeightedKeyword]) -> Option<f32> {
    keywords
        .iter()
        .filter(|k| keyword_matches(topic, &k.word))
        .map(|k| k.weight)
        .fold(None, |acc: Option<f32>, w| Some(acc.map_or(w, |a| a.max(w))))
}

pub fn relevance_score(topics: &BTreeMap<String, f32>, keywords: &[WeightedKeyword]) -> f32 {
    let total: f32 = topics.values().sum();
    if total <= 0.0 {
        return NO_TOPIC_SCORE;
    }

    let accumulated: f32 = topics
        .iter()
        .filter(|(_, p)| **p > MIN_TOPIC_PROBABILITY)
        .filter_map(|(topic, p)| best_weight(topic, keywords).map(|w| w * p))
        .sum();

    (accumulated / total).min(1.0)
}

/// Inclusive threshold comparison.
pub fn qualifies(score: f32, entry_threshold: f32) -> bool {
    score >= entry_threshold
}
