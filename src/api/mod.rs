use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityEngine;
use crate::engine_stats::{EngineSnapshot, ENGINE_STATS};
use crate::error::ActivityError;

const DEFAULT_LOOKBACK_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ActivityEngine>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    start: Option<u64>,
    end: Option<u64>,
}

/// Missing `end` means now; missing `start` means 30 days before `end`.
pub fn resolve_window(start: Option<u64>, end: Option<u64>) -> (u64, u64) {
    let end = end.unwrap_or_else(now_unix);
    let start = start.unwrap_or_else(|| end.saturating_sub(DEFAULT_LOOKBACK_SECS));
    (start, end)
}

pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl IntoResponse for ActivityError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn activity(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(window): Query<WindowQuery>,
) -> Result<Response, ActivityError> {
    let (start, end) = resolve_window(window.start, window.end);
    let report = state.engine.build_report(&address, start, end).await?;
    Ok(Json(report).into_response())
}

async fn stats(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(window): Query<WindowQuery>,
) -> Result<Response, ActivityError> {
    let (start, end) = resolve_window(window.start, window.end);
    let stats = state.engine.build_stats(&address, start, end).await?;
    Ok(Json(stats).into_response())
}

async fn engine_stats() -> Json<EngineSnapshot> {
    Json(ENGINE_STATS.snapshot())
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/activity/:address", get(activity))
        .route("/stats/engine", get(engine_stats))
        .route("/stats/:address", get(stats))
        .with_state(state)
}

pub async fn run_http_server(addr: &str, state: AppState) -> Result<()> {
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
