// src/ingest/refresh.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::gauge;
use tokio::task::JoinHandle;

use super::{refresh_all, FeedFetcher};
use crate::store::{ArticleStore, FeedStore};

/// Spawn a lightweight loop that refreshes every enabled feed each `period`.
/// The first tick runs immediately.
pub fn spawn_feed_refresh(
    fetcher: Arc<dyn FeedFetcher>,
    feeds: Arc<dyn FeedStore>,
    articles: Arc<dyn ArticleStore>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp().max(0);

            let list = match feeds.feeds().await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, "loading feed list failed");
                    continue;
                }
            };
            let results = refresh_all(fetcher.as_ref(), &list, articles.as_ref()).await;
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();

            gauge!("ingest_last_run_ts").set(now as f64);
            tracing::info!(
                target: "ingest",
                feeds = results.len(),
                failed,
                "feed refresh tick"
            );
        }
    })
}
