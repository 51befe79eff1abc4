// src/config/scheduler.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SCHEDULER_CONFIG_PATH: &str = "config/scheduler.toml";
pub const ENV_SCHEDULER_CONFIG_PATH: &str = "SCHEDULER_CONFIG_PATH";
pub const ENV_SCHEDULER_BATCH_SIZE: &str = "SCHEDULER_BATCH_SIZE";

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_ALARM_NAME: &str = "pool-analysis";
pub const DEFAULT_FEED_REFRESH_SECS: u64 = 30 * 60;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_alarm_name() -> String {
    DEFAULT_ALARM_NAME.to_string()
}
fn default_feed_refresh_secs() -> u64 {
    DEFAULT_FEED_REFRESH_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Raw articles fetched per cycle. Only the first one is analyzed.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Name of the single alarm the scheduler re-arms.
    #[serde(default = "default_alarm_name")]
    pub alarm_name: String,
    /// Feed refresh period used by the binary's ingest loop.
    #[serde(default = "default_feed_refresh_secs")]
    pub feed_refresh_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            alarm_name: DEFAULT_ALARM_NAME.to_string(),
            feed_refresh_secs: DEFAULT_FEED_REFRESH_SECS,
        }
    }
}

// parse optional positive integer env
fn parse_batch_env(raw: Option<String>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
}

impl SchedulerConfig {
    /// Parse TOML. Keys may live at the top level or under `[scheduler]`.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(s).context("parsing scheduler config")?;
        let section = match table.remove("scheduler") {
            Some(v) => v,
            None => toml::Value::Table(table),
        };
        let mut cfg: SchedulerConfig = section
            .try_into()
            .context("invalid scheduler config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading scheduler config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) $SCHEDULER_CONFIG_PATH (must exist)
    /// 2) config/scheduler.toml
    /// 3) built-in defaults
    ///
    /// `$SCHEDULER_BATCH_SIZE` overrides the batch size in every case.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_SCHEDULER_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("SCHEDULER_CONFIG_PATH points to non-existent path");
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_SCHEDULER_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default()
            }
        };

        if let Some(n) = parse_batch_env(std::env::var(ENV_SCHEDULER_BATCH_SIZE).ok()) {
            cfg.batch_size = n;
        }
        Ok(cfg)
    }

    fn sanitize(&mut self) {
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if self.alarm_name.trim().is_empty() {
            self.alarm_name = default_alarm_name();
        }
        if self.feed_refresh_secs == 0 {
            self.feed_refresh_secs = DEFAULT_FEED_REFRESH_SECS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn parses_flat_and_sectioned_toml() {
        let flat = SchedulerConfig::from_toml_str("batch_size = 4").unwrap();
        assert_eq!(flat.batch_size, 4);
        assert_eq!(flat.alarm_name, DEFAULT_ALARM_NAME);

        let sect = SchedulerConfig::from_toml_str(
            "[scheduler]\nbatch_size = 7\nalarm_name = \"x\"\n",
        )
        .unwrap();
        assert_eq!(sect.batch_size, 7);
        assert_eq!(sect.alarm_name, "x");
    }

    #[test]
    fn zero_batch_falls_back_to_default() {
        let cfg = SchedulerConfig::from_toml_str("batch_size = 0").unwrap();
        assert_eq!(cfg.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Isolate CWD so the repo's own config/ is not picked up
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_SCHEDULER_CONFIG_PATH);
        env::remove_var(ENV_SCHEDULER_BATCH_SIZE);

        assert_eq!(SchedulerConfig::load_default().unwrap(), SchedulerConfig::default());

        let p = tmp.path().join("sched.toml");
        fs::write(&p, "batch_size = 3").unwrap();
        env::set_var(ENV_SCHEDULER_CONFIG_PATH, p.display().to_string());
        assert_eq!(SchedulerConfig::load_default().unwrap().batch_size, 3);

        env::set_var(ENV_SCHEDULER_BATCH_SIZE, "25");
        assert_eq!(SchedulerConfig::load_default().unwrap().batch_size, 25);

        env::set_var(ENV_SCHEDULER_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(SchedulerConfig::load_default().is_err());

        env::remove_var(ENV_SCHEDULER_CONFIG_PATH);
        env::remove_var(ENV_SCHEDULER_BATCH_SIZE);
        env::set_current_dir(&old).unwrap();
    }
}
