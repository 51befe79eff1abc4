// src/ingest/mod.rs
//! Feed ingestion: fetch RSS, normalize, and keep the article store in sync
//! with what each feed currently lists. New items enter the pool as `raw`.

pub mod fetch;
pub mod refresh;
pub mod rss;

use std::collections::HashSet;

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::article::ArticlePatch;
use crate::store::ArticleStore;

pub use fetch::{FeedFetcher, HttpFeedFetcher};
pub use rss::{parse_feed, FeedItem};

/// Max characters kept from any normalized text field.
pub const TEXT_CAP_CHARS: usize = 20_000;

/// A subscribed RSS feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items parsed from feeds.");
        describe_histogram!("ingest_parse_ms", "RSS document parse time in milliseconds.");
        describe_counter!("ingest_inserted_total", "New raw articles created from feeds.");
        describe_counter!(
            "ingest_dropped_total",
            "Stored articles marked out-of-feed after leaving their feed."
        );
        describe_counter!("ingest_feed_errors_total", "Feed fetch/parse errors.");
        describe_counter!("ingest_insert_errors_total", "New articles the store refused.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when the feed refresh last ran."
        );
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. NBSP)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[\s\u{00A0}]+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > TEXT_CAP_CHARS {
        out = out.chars().take(TEXT_CAP_CHARS).collect();
    }

    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub inserted: usize,
    /// New items the store refused; retried on the next refresh.
    pub insert_failed: usize,
    pub dropped_from_feed: usize,
    pub returned_to_feed: usize,
    pub unchanged: usize,
}

/// Reconcile the store with the latest items of one feed:
/// unseen items are inserted as `raw`, stored items missing from the feed get
/// `in_feed = false`, and items that reappear get `in_feed = true` again.
pub async fn sync_feed(
    store: &dyn ArticleStore,
    feed_id: &str,
    items: Vec<FeedItem>,
) -> Result<SyncReport> {
    ensure_metrics_described();

    let existing = store.list_by_feed(feed_id).await?;
    let known: HashSet<&str> = existing.iter().map(|a| a.id.as_str()).collect();
    let mut current: HashSet<String> = HashSet::with_capacity(items.len());
    let mut report = SyncReport::default();

    for item in items {
        let article = item.into_article(feed_id);
        if !current.insert(article.id.clone()) {
            continue;
        }
        if !known.contains(article.id.as_str()) {
            let id = article.id.clone();
            match store.insert(article).await {
                Ok(()) => report.inserted += 1,
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, feed = feed_id, article = %id, "insert failed; skipped");
                    counter!("ingest_insert_errors_total").increment(1);
                    report.insert_failed += 1;
                }
            }
        }
    }

    for a in &existing {
        let listed = current.contains(&a.id);
        match (a.in_feed, listed) {
            (true, false) => {
                store
                    .update(
                        &a.id,
                        ArticlePatch {
                            in_feed: Some(false),
                            ..Default::default()
                        },
                    )
                    .await?;
                report.dropped_from_feed += 1;
            }
            (false, true) => {
                store
                    .update(
                        &a.id,
                        ArticlePatch {
                            in_feed: Some(true),
                            ..Default::default()
                        },
                    )
                    .await?;
                report.returned_to_feed += 1;
            }
            _ => report.unchanged += 1,
        }
    }

    counter!("ingest_inserted_total").increment(report.inserted as u64);
    counter!("ingest_dropped_total").increment(report.dropped_from_feed as u64);

    tracing::info!(
        target: "ingest",
        feed = feed_id,
        inserted = report.inserted,
        insert_failed = report.insert_failed,
        dropped = report.dropped_from_feed,
        returned = report.returned_to_feed,
        "feed synced"
    );
    Ok(report)
}

/// Fetch, parse and sync every enabled feed. A failing feed is logged and
/// skipped; the others still run.
pub async fn refresh_all(
    fetcher: &dyn FeedFetcher,
    feeds: &[Feed],
    store: &dyn ArticleStore,
) -> Vec<(String, Result<SyncReport>)> {
    ensure_metrics_described();

    let mut out = Vec::with_capacity(feeds.len());
    for feed in feeds.iter().filter(|f| f.enabled) {
        let res = async {
            let xml = fetcher.fetch(feed).await?;
            let items = parse_feed(&xml)?;
            sync_feed(store, &feed.id, items).await
        }
        .await;
        if let Err(e) = &res {
            tracing::warn!(target: "ingest", error = ?e, feed = %feed.id, "feed refresh failed");
            counter!("ingest_feed_errors_total").increment(1);
        }
        out.push((feed.id.clone(), res));
    }
    out
}
