//! AI adapter: provider abstraction + file cache.
//! Topic extraction for articles; the scheduler turns topics into a score.

use std::collections::BTreeMap;
use std::fs;
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ai::AiConfig;
use crate::profile::UserProfileView;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Result returned by analysis engines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Topic label → probability in [0, 1].
    pub topic_probabilities: BTreeMap<String, f32>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub provider: String,
}

impl AnalysisResult {
    pub fn from_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        Self {
            topic_probabilities: topics.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            summary: None,
            provider: String::new(),
        }
    }
}

/// Why the caller is asking; part of the cache key and the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisPurpose {
    #[default]
    RecommendContent,
    ProfileContent,
}

impl AnalysisPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPurpose::RecommendContent => "recommend-content",
            AnalysisPurpose::ProfileContent => "profile-content",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOptions {
    pub user_profile: Option<UserProfileView>,
    pub purpose: AnalysisPurpose,
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI analysis is disabled")]
    Disabled,
    #[error("missing API key for provider `{0}`")]
    MissingApiKey(&'static str),
    #[error("provider request failed")]
    Http(#[from] reqwest::Error),
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl AiError {
    pub fn kind(&self) -> &'static str {
        match self {
            AiError::Disabled => "AiError::Disabled",
            AiError::MissingApiKey(_) => "AiError::MissingApiKey",
            AiError::Http(_) => "AiError::Http",
            AiError::Status(_) => "AiError::Status",
            AiError::Malformed(_) => "AiError::Malformed",
        }
    }
}

pub type AiFuture<'a> = Pin<Box<dyn Future<Output = Result<AnalysisResult, AiError>> + Send + 'a>>;

/// Trait object used by the scheduler and tests.
pub trait AiClient: Send + Sync {
    fn analyze_content<'a>(&'a self, text: &'a str, options: &'a AnalyzeOptions) -> AiFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynAiClient = Arc<dyn AiClient>;

pub const ENV_AI_CACHE_DIR: &str = "AI_CACHE_DIR";

/// Factory: build a client according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock client.
/// * Else if `config.enabled==false`, returns a disabled client.
/// * Else builds the real provider (OpenAI) wrapped with caching.
pub fn build_client_from_config(config: &AiConfig) -> DynAiClient {
    if crate::config::ai::mock_mode() {
        let mock = MockProvider {
            fixed: AnalysisResult::from_topics([("technology", 0.6_f32), ("science", 0.3)]),
        };
        return Arc::new(CachingClient::new(mock, default_cache_dir()));
    }

    if !config.enabled {
        return Arc::new(DisabledClient);
    }

    match config.provider.as_str() {
        "openai" => match OpenAiProvider::new(config) {
            Ok(provider) => Arc::new(CachingClient::new(provider, default_cache_dir())),
            Err(e) => {
                tracing::warn!(target: "ai", error = ?e, "openai client build failed; AI disabled");
                Arc::new(DisabledClient)
            }
        },
        other => {
            tracing::warn!(target: "ai", provider = other, "unsupported AI provider; AI disabled");
            Arc::new(DisabledClient)
        }
    }
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: does a *real* remote call. Separated so we can reuse the same
/// caching wrapper for production and tests.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(&'a self, text: &'a str, options: &'a AnalyzeOptions) -> AiFuture<'a>;
    fn name(&self) -> &'static str;
}

/// OpenAI provider (Chat Completions API, JSON mode).
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = if config.api_key.trim().is_empty() {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            config.api_key.clone()
        };
        let http = reqwest::Client::builder()
            .user_agent("silent-feed/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
        })
    }
}

const SYSTEM_PROMPT: &str = "You classify articles for a personal reading assistant. \
Reply with a JSON object {\"topics\": {\"<short topic label>\": <probability 0..1>}, \"summary\": \"<one sentence>\"}. \
Use at most 8 topics; probabilities should sum to at most 1.";

fn user_prompt(text: &str, options: &AnalyzeOptions) -> String {
    let mut out = format!("Purpose: {}\n", options.purpose.as_str());
    if let Some(p) = &options.user_profile {
        if !p.interests.is_empty() {
            out.push_str(&format!("Reader interests: {}\n", p.interests));
        }
        if !p.preferences.is_empty() {
            out.push_str(&format!("Reader preferences: {}\n", p.preferences.join(", ")));
        }
        if !p.avoid_topics.is_empty() {
            out.push_str(&format!("Reader avoids: {}\n", p.avoid_topics.join(", ")));
        }
    }
    out.push_str("\nArticle:\n");
    out.push_str(text);
    out
}

impl Provider for OpenAiProvider {
    fn fetch<'a>(&'a self, text: &'a str, options: &'a AnalyzeOptions) -> AiFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(AiError::MissingApiKey("openai"));
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct ResponseFormat {
                #[serde(rename = "type")]
                kind: &'static str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
                response_format: ResponseFormat,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let prompt = user_prompt(text, options);
            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    Msg {
                        role: "user",
                        content: &prompt,
                    },
                ],
                temperature: 0.2,
                max_tokens: 300,
                response_format: ResponseFormat {
                    kind: "json_object",
                },
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(AiError::Status(resp.status().as_u16()));
            }
            let body: Resp = resp.json().await?;
            let content = body
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .ok_or_else(|| AiError::Malformed("no choices".into()))?;
            let mut result = parse_reply(content)?;
            result.provider = self.name().to_string();
            Ok(result)
        })
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Parse the provider's JSON reply into a sanitized result.
pub fn parse_reply(content: &str) -> Result<AnalysisResult, AiError> {
    #[derive(Deserialize)]
    struct Reply {
        #[serde(default)]
        topics: BTreeMap<String, f32>,
        #[serde(default)]
        summary: Option<String>,
    }
    let reply: Reply =
        serde_json::from_str(content.trim()).map_err(|e| AiError::Malformed(e.to_string()))?;
    Ok(sanitize_result(AnalysisResult {
        topic_probabilities: reply.topics,
        summary: reply.summary,
        provider: String::new(),
    }))
}

/// Fails every call; used when AI is disabled.
pub struct DisabledClient;

impl AiClient for DisabledClient {
    fn analyze_content<'a>(&'a self, _text: &'a str, _options: &'a AnalyzeOptions) -> AiFuture<'a> {
        Box::pin(async { Err(AiError::Disabled) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Simple mock provider for tests/local runs.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: AnalysisResult,
}

impl Provider for MockProvider {
    fn fetch<'a>(&'a self, _text: &'a str, _options: &'a AnalyzeOptions) -> AiFuture<'a> {
        let mut out = self.fixed.clone();
        out.provider = "mock".to_string();
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Caching client wrapper (file cache)
// ------------------------------------------------------------

pub struct CachingClient<P: Provider> {
    inner: P,
    cache_dir: PathBuf,
}

impl<P: Provider> CachingClient<P> {
    pub fn new(inner: P, cache_dir: PathBuf) -> Self {
        let _ = fs::create_dir_all(&cache_dir); // best-effort
        Self { inner, cache_dir }
    }

    async fn analyze_impl(
        &self,
        text: &str,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResult, AiError> {
        let key = cache_key(text, options);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            tracing::debug!(target: "ai", %key, "cache hit");
            return Ok(hit);
        }

        let fresh = sanitize_result(self.inner.fetch(text, options).await?);
        if let Err(e) = write_cache_file(&self.cache_dir, &key, &fresh) {
            tracing::debug!(target: "ai", error = ?e, "cache write failed");
        }
        Ok(fresh)
    }
}

impl<P: Provider> AiClient for CachingClient<P> {
    fn analyze_content<'a>(&'a self, text: &'a str, options: &'a AnalyzeOptions) -> AiFuture<'a> {
        Box::pin(self.analyze_impl(text, options))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

fn default_cache_dir() -> PathBuf {
    std::env::var(ENV_AI_CACHE_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("cache/ai"))
}

fn cache_key(text: &str, options: &AnalyzeOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(options.purpose.as_str().as_bytes());
    hasher.update([0u8]);
    if let Some(p) = &options.user_profile {
        hasher.update(serde_json::to_vec(p).unwrap_or_default());
    }
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<AnalysisResult> {
    let path = cache_path(dir, key);
    let mut file = fs::File::open(path).ok()?;
    let mut buf = String::new();
    file.read_to_string(&mut buf).ok()?;
    serde_json::from_str(&buf).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &AnalysisResult) -> io::Result<()> {
    let path = cache_path(dir, key);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value).map_err(io::Error::other)?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)?;
    Ok(())
}

// ------------------------------------------------------------
// Sanitization
// ------------------------------------------------------------

/// Clamp probabilities into [0,1], drop non-finite values and blank labels,
/// and squash the summary to a single short line.
pub fn sanitize_result(mut r: AnalysisResult) -> AnalysisResult {
    r.topic_probabilities = r
        .topic_probabilities
        .into_iter()
        .filter_map(|(k, v)| {
            let label = k.trim().to_string();
            if label.is_empty() || !v.is_finite() {
                return None;
            }
            Some((label, v.clamp(0.0, 1.0)))
        })
        .collect();
    r.summary = r
        .summary
        .map(|s| sanitize_summary(&s))
        .filter(|s| !s.is_empty());
    r
}

/// Single line, collapsed whitespace, <=160 chars.
pub fn sanitize_summary(input: &str) -> String {
    let mut out = String::with_capacity(160);
    let mut prev_space = false;
    for ch in input.chars() {
        let c = if ch.is_whitespace() { ' ' } else { ch };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
        if out.chars().count() >= 160 {
            break;
        }
    }
    out.trim().to_string()
}
