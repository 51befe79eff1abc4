//! Local keyword analysis: term frequencies over the article text, used when
//! remote AI is switched off. Produces the same `AnalysisResult` shape so the
//! scheduler scores both engines identically.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::ai_adapter::{AiClient, AiFuture, AnalysisResult, AnalyzeOptions};

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w+\b").expect("word regex"));

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "how",
    "in", "into", "is", "it", "its", "of", "on", "or", "that", "the", "their", "this", "to", "was",
    "were", "what", "when", "which", "who", "why", "will", "with", "you", "your",
];

pub const DEFAULT_TOP_TERMS: usize = 5;

#[derive(Debug, Clone)]
pub struct KeywordAnalyzer {
    top_terms: usize,
}

impl Default for KeywordAnalyzer {
    fn default() -> Self {
        Self {
            top_terms: DEFAULT_TOP_TERMS,
        }
    }
}

impl KeywordAnalyzer {
    pub fn with_top_terms(top_terms: usize) -> Self {
        Self {
            top_terms: top_terms.max(1),
        }
    }

    /// Lowercased content words: no stop words, no bare numbers, no underscores-only.
    pub fn terms(text: &str) -> Vec<String> {
        RE_WORD
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|w| w.chars().any(char::is_alphabetic))
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .collect()
    }

    /// Top-N terms by frequency (ties alphabetical), normalized so the
    /// probabilities of the kept terms sum to 1. Empty text yields no topics.
    pub fn analyze(&self, text: &str) -> AnalysisResult {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for t in Self::terms(text) {
            *counts.entry(t).or_insert(0) += 1;
        }
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.top_terms);

        let total: usize = ranked.iter().map(|(_, c)| *c).sum();
        let mut out = AnalysisResult {
            provider: "keyword".to_string(),
            ..Default::default()
        };
        if total == 0 {
            return out;
        }
        for (term, c) in ranked {
            out.topic_probabilities
                .insert(term, c as f32 / total as f32);
        }
        out
    }
}

impl AiClient for KeywordAnalyzer {
    fn analyze_content<'a>(&'a self, text: &'a str, _options: &'a AnalyzeOptions) -> AiFuture<'a> {
        let out = self.analyze(text);
        Box::pin(async move { Ok(out) })
    }
    fn provider_name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stop_words_and_numbers() {
        let r = KeywordAnalyzer::default().analyze("AI breakthroughs in 2024");
        assert_eq!(r.topic_probabilities.len(), 2);
        assert_eq!(r.topic_probabilities.get("ai"), Some(&0.5));
        assert_eq!(r.topic_probabilities.get("breakthroughs"), Some(&0.5));
    }

    #[test]
    fn keeps_top_terms_by_frequency() {
        let r = KeywordAnalyzer::with_top_terms(2).analyze("rust rust rust tokio tokio axum serde");
        let keys: Vec<_> = r.topic_probabilities.keys().cloned().collect();
        assert_eq!(keys, vec!["rust".to_string(), "tokio".to_string()]);
        assert!((r.topic_probabilities["rust"] - 0.6).abs() < 1e-6);
        let sum: f32 = r.topic_probabilities.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_text_has_no_topics() {
        let r = KeywordAnalyzer::default().analyze("   the of 42 ");
        assert!(r.topic_probabilities.is_empty());
        assert_eq!(r.provider, "keyword");
    }
}
