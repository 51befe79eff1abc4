// src/analyze/mod.rs
//! Analysis engines (remote AI, local keywords) and relevance scoring.

pub mod ai_adapter;
pub mod keywords;
pub mod scoring;

pub use ai_adapter::{
    build_client_from_config, AiClient, AiError, AnalysisPurpose, AnalysisResult, AnalyzeOptions,
    DynAiClient,
};
pub use keywords::KeywordAnalyzer;
pub use scoring::{qualifies, relevance_score};
