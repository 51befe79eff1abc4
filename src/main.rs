//! Silent Feed binary entrypoint.
//! Seeds the stores, starts the analysis scheduler and the feed refresh loop,
//! and serves the HTTP surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use silent_feed::ai_adapter::build_client_from_config;
use silent_feed::config::{AiConfig, SchedulerConfig};
use silent_feed::context::{tokio_alarms, AppContext, MemoryStores, DEFAULT_DATA_DIR, ENV_DATA_DIR};
use silent_feed::ingest::{refresh::spawn_feed_refresh, HttpFeedFetcher};
use silent_feed::metrics::Metrics;

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - SILENT_FEED_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("SILENT_FEED_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scheduler=debug,ingest=info,ai=info,warn"));

    // Shuttle may already own the global subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let sched_cfg = SchedulerConfig::load_default()?;
    // Recorder first: series and descriptions emitted before it are lost.
    let metrics = Metrics::init(&sched_cfg)?;

    let ai_cfg = AiConfig::load_default()?;
    let ai = build_client_from_config(&ai_cfg);
    tracing::info!(provider = ai.provider_name(), enabled = ai_cfg.enabled, "AI client ready");

    let data_dir = std::env::var(ENV_DATA_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
    let stores = MemoryStores::load_dir(&data_dir, ai_cfg)?;

    let ctx = AppContext::in_memory(sched_cfg.clone(), stores.clone(), tokio_alarms(), ai);

    let fetcher = Arc::new(HttpFeedFetcher::new()?);
    spawn_feed_refresh(
        fetcher,
        stores.feeds.clone(),
        stores.articles.clone(),
        Duration::from_secs(sched_cfg.feed_refresh_secs),
    );

    let scheduler = ctx.scheduler.clone();
    tokio::spawn(async move {
        if let Err(e) = scheduler.start().await {
            tracing::error!(error = ?e, "analysis scheduler failed to start");
        }
    });

    let router = silent_feed::api::router(ctx).merge(metrics.router());

    Ok(router.into())
}
