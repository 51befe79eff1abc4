// src/scheduler/alarm.rs
//! Named one-shot alarms. Firing broadcasts the alarm name to subscribers;
//! a fire with nobody listening is dropped.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[async_trait]
pub trait AlarmService: Send + Sync {
    /// Arm `name` to fire once after `delay`, replacing a pending alarm of the same name.
    async fn create(&self, name: &str, delay: Duration) -> Result<()>;
    /// Cancel `name`. Returns whether a pending alarm was cancelled.
    async fn clear(&self, name: &str) -> Result<bool>;
    /// Register for fire events.
    fn subscribe(&self) -> Result<broadcast::Receiver<String>>;
}

/// Alarm facility backed by tokio timers: one sleeping task per armed name.
pub struct TokioAlarms {
    tx: broadcast::Sender<String>,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Default for TokioAlarms {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioAlarms {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self {
            tx,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending
            .lock()
            .map(|g| g.get(name).is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl AlarmService for TokioAlarms {
    async fn create(&self, name: &str, delay: Duration) -> Result<()> {
        let tx = self.tx.clone();
        let fire_name = name.to_string();
        let mut g = self.pending.lock().map_err(|_| anyhow!("alarm table poisoned"))?;
        if let Some(prev) = g.remove(name) {
            prev.abort();
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(fire_name.clone()).is_err() {
                tracing::debug!(target: "scheduler", alarm = %fire_name, "alarm fired with no listener");
            }
        });
        g.insert(name.to_string(), handle);
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<bool> {
        let mut g = self.pending.lock().map_err(|_| anyhow!("alarm table poisoned"))?;
        Ok(match g.remove(name) {
            Some(h) => {
                let was_pending = !h.is_finished();
                h.abort();
                was_pending
            }
            None => false,
        })
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<String>> {
        Ok(self.tx.subscribe())
    }
}

impl Drop for TokioAlarms {
    fn drop(&mut self) {
        if let Ok(g) = self.pending.get_mut() {
            for (_, h) in g.drain() {
                h.abort();
            }
        }
    }
}
