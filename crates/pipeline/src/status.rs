//! Status API
//!
//! Read-only HTTP view of the running pipeline.

use crate::stats::{PipelineStats, SharedStats};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared across handlers
pub struct StatusState {
    pub stats: SharedStats,
    pub version: String,
    pub start_time: Instant,
    pub metrics: Option<PrometheusHandle>,
}

impl StatusState {
    pub fn new(stats: SharedStats, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            stats,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            metrics,
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub readings_processed: u64,
}

/// Create the status router
pub fn create_router(state: Arc<StatusState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<StatusState>>) -> Json<HealthResponse> {
    let readings_processed = state.stats.read().await.readings_processed;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        readings_processed,
    })
}

async fn stats_handler(State(state): State<Arc<StatusState>>) -> Json<PipelineStats> {
    Json(state.stats.read().await.clone())
}

async fn metrics_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed".to_string()),
    }
}

/// Serve the status API until `cancel` fires
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<StatusState>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    info!("Status API listening on {}", listener.local_addr()?);
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            info!("Status API shutting down");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn state() -> Arc<StatusState> {
        let stats = Arc::new(RwLock::new(PipelineStats {
            readings_processed: 12,
            windows_flushed: 1,
            ..Default::default()
        }));
        Arc::new(StatusState::new(stats, None))
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = create_router(state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json("/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["readings_processed"], 12);
    }

    #[tokio::test]
    async fn test_stats() {
        let (status, body) = get_json("/api/v1/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["windows_flushed"], 1);
        assert_eq!(body["attestations_persisted"], 0);
    }

    #[tokio::test]
    async fn test_metrics_without_exporter() {
        let (status, _) = get_json("/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
