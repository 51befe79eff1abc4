// src/ingest/rss.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::article::Article;
use crate::ingest::{ensure_metrics_described, normalize_text};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    content: Option<String>,
}
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

/// One normalized feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    /// Stable key within the feed: guid, else link, else title.
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Article id derived from the feed id and the item key.
    pub fn article_id(&self, feed_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(feed_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.key.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(feed_id.len() + 17);
        out.push_str(feed_id);
        out.push(':');
        for b in digest.iter().take(8) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }

    pub fn into_article(self, feed_id: &str) -> Article {
        let id = self.article_id(feed_id);
        let mut a = Article::new_raw(id, feed_id, self.title);
        a.description = self.description;
        a.content = self.content;
        a.link = self.link;
        a.published_at = self.published_at;
        a
    }
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), 0))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| normalize_text(&v)).filter(|v| !v.is_empty())
}

/// Parse an RSS 2.0 document. Items without any usable key are skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>> {
    ensure_metrics_described();
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = non_empty(it.title).unwrap_or_default();
        let link = it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        let guid = it
            .guid
            .map(|g| g.value.trim().to_string())
            .filter(|g| !g.is_empty());
        let Some(key) = guid.or_else(|| link.clone()).or_else(|| {
            Some(title.clone()).filter(|t| !t.is_empty())
        }) else {
            continue;
        };

        out.push(FeedItem {
            key,
            title,
            description: non_empty(it.description),
            content: non_empty(it.content),
            link,
            published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
        });
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_items_total").increment(out.len() as u64);
    Ok(out)
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
