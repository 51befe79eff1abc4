// src/ingest/fetch.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::Feed;

/// Source of raw feed documents.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, feed: &Feed) -> Result<String>;
}

pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("silent-feed/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, feed: &Feed) -> Result<String> {
        let resp = self
            .client
            .get(&feed.url)
            .send()
            .await
            .with_context(|| format!("GET {}", feed.url))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("feed {} returned HTTP {status}", feed.id);
        }
        resp.text().await.context("reading feed body")
    }
}
