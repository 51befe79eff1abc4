// src/api.rs
//! HTTP surface: scheduler status, manual trigger, strategy update, pool stats.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::article::PoolStats;
use crate::config::PoolStrategy;
use crate::context::AppContext;
use crate::scheduler::{CycleOutcome, SchedulerStatus};

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/scheduler/status", get(status))
        .route("/scheduler/trigger", post(trigger))
        .route("/scheduler/strategy", put(update_strategy))
        .route("/pool/stats", get(pool_stats))
        .layer(CorsLayer::very_permissive())
        .with_state(ctx)
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, msg: impl ToString) -> ApiError {
    (status, Json(json!({ "error": msg.to_string() })))
}

async fn status(State(ctx): State<AppContext>) -> Json<SchedulerStatus> {
    Json(ctx.scheduler.status())
}

async fn trigger(State(ctx): State<AppContext>) -> Json<CycleOutcome> {
    Json(ctx.scheduler.trigger_manual().await)
}

async fn update_strategy(
    State(ctx): State<AppContext>,
    Json(strategy): Json<PoolStrategy>,
) -> Result<Json<PoolStrategy>, ApiError> {
    strategy
        .validate()
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    ctx.collaborators
        .settings
        .set_pool_strategy(strategy)
        .await
        .map_err(|e| {
            tracing::warn!(error = ?e, "storing strategy failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "storing strategy failed")
        })?;
    ctx.scheduler
        .update_strategy(strategy)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    Ok(Json(strategy))
}

async fn pool_stats(State(ctx): State<AppContext>) -> Result<Json<PoolStats>, ApiError> {
    ctx.collaborators
        .articles
        .pool_stats()
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(error = ?e, "pool stats failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "pool stats unavailable")
        })
}
