// src/metrics.rs
//! Prometheus exposition for the scheduler and ingest series.

use axum::{extract::State, routing::get, Router};
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::SchedulerConfig;

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder and publish the static scheduler settings.
    /// Fails if a global recorder is already installed.
    pub fn init(cfg: &SchedulerConfig) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;

        describe_gauge!("scheduler_batch_size", "Raw articles fetched per cycle.");
        describe_gauge!("feed_refresh_period_secs", "Feed refresh loop period.");
        gauge!("scheduler_batch_size").set(cfg.batch_size as f64);
        gauge!("feed_refresh_period_secs").set(cfg.feed_refresh_secs as f64);

        Ok(Self { handle })
    }

    /// A handle not bound to the global recorder; renders an empty page.
    pub fn detached() -> Self {
        Self {
            handle: PrometheusBuilder::new().build_recorder().handle(),
        }
    }

    /// `/metrics` in the Prometheus text format, mergeable into any router.
    pub fn router<S: Clone + Send + Sync + 'static>(&self) -> Router<S> {
        Router::new()
            .route("/metrics", get(render))
            .with_state(self.clone())
    }
}

async fn render(State(m): State<Metrics>) -> String {
    m.handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{self, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt as _;

    #[tokio::test]
    async fn metrics_route_serves_text() {
        let app: Router = Metrics::detached().router();
        let resp = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        assert!(std::str::from_utf8(&bytes).is_ok());
    }
}
