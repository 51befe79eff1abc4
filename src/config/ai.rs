// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";
pub const ENV_AI_TEST_MODE: &str = "AI_TEST_MODE";

/// `AI_TEST_MODE=mock`: the deterministic mock client replaces the provider.
pub fn mock_mode() -> bool {
    env::var(ENV_AI_TEST_MODE).is_ok_and(|v| v == "mock")
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    /// When false the scheduler falls back to the local keyword analyzer.
    pub enabled: bool,
    /// "openai" (case-insensitive); anything else builds a disabled client.
    #[serde(default)]
    pub provider: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Whole-request timeout for the provider's HTTP client.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: String::new(),
            api_key: String::new(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let mut cfg: AiConfig = serde_json::from_str(data)?;

        // Normalize provider
        cfg.provider = cfg.provider.trim().to_lowercase();

        // Resolve api key if "ENV"; a disabled config never needs one.
        if cfg.enabled && cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        if cfg.model.trim().is_empty() {
            cfg.model = default_model();
        }
        if cfg.timeout_secs == 0 {
            cfg.timeout_secs = default_timeout_secs();
        }

        Ok(cfg)
    }

    /// Resolve `$AI_CONFIG_PATH` or `config/ai.json`. A missing file yields the
    /// disabled default; a present but broken file is an error.
    /// Under mock mode the result is always enabled so the mock gets called.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = env::var(ENV_AI_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_AI_CONFIG_PATH.into());
        let mut cfg = if Path::new(&path).exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::info!(target: "ai", %path, "no AI config file");
            Self::default()
        };
        if mock_mode() && !cfg.enabled {
            tracing::info!(target: "ai", "AI_TEST_MODE=mock; enabling mock analysis");
            cfg.enabled = true;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = AiConfig::from_json_str(r#"{"enabled": true, "provider": " OpenAI "}"#).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.timeout_secs, 20);
    }

    #[serial_test::serial]
    #[test]
    fn env_key_is_resolved_by_provider() {
        env::set_var("OPENAI_API_KEY", "sk-test");
        let cfg =
            AiConfig::from_json_str(r#"{"enabled": true, "provider": "openai", "api_key": "ENV"}"#)
                .unwrap();
        assert_eq!(cfg.api_key, "sk-test");
        env::remove_var("OPENAI_API_KEY");

        let err =
            AiConfig::from_json_str(r#"{"enabled": true, "provider": "openai", "api_key": "env"}"#);
        assert!(err.is_err());

        let off =
            AiConfig::from_json_str(r#"{"enabled": false, "provider": "openai", "api_key": "ENV"}"#)
                .unwrap();
        assert_eq!(off.api_key, "ENV");
    }

    #[serial_test::serial]
    #[test]
    fn mock_mode_enables_a_disabled_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ai.json");
        fs::write(&path, r#"{"enabled": false, "provider": "openai", "api_key": "ENV"}"#).unwrap();
        env::set_var(ENV_AI_CONFIG_PATH, &path);

        env::remove_var(ENV_AI_TEST_MODE);
        assert!(!AiConfig::load_default().unwrap().enabled);

        env::set_var(ENV_AI_TEST_MODE, "mock");
        assert!(AiConfig::load_default().unwrap().enabled);

        env::remove_var(ENV_AI_TEST_MODE);
        env::remove_var(ENV_AI_CONFIG_PATH);
    }

    #[test]
    fn api_key_is_never_serialized() {
        let cfg = AiConfig {
            api_key: "secret".into(),
            ..Default::default()
        };
        let s = serde_json::to_string(&cfg).unwrap();
        assert!(!s.contains("secret"));
    }
}
