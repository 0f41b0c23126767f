//! Health, readiness and metrics endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use crate::metrics;
use crate::models::HealthResponse;
use crate::AppState;

/// Service health check
/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)),
    tag = "System"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Readiness probe; verifies the history database answers
/// GET /ready
pub async fn ready_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (StatusCode::OK, "READY").into_response(),
        Err(e) => {
            tracing::error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY").into_response()
        },
    }
}

/// Prometheus text exposition of the pipeline counters
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.metrics_enabled {
        return (StatusCode::NOT_FOUND, "Not Found".to_string()).into_response();
    }
    (StatusCode::OK, metrics::render()).into_response()
}
