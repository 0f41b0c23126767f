//! Per-user template statistics endpoint

use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

use super::ApiError;
use crate::metrics;
use crate::models::UserStats;
use crate::AppState;

/// Template statistics for one user
/// GET /stats/:user_id
#[utoipa::path(
    get,
    path = "/stats/{user_id}",
    params(("user_id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User statistics", body = UserStats),
        (status = 500, description = "Internal error")
    ),
    tag = "Analysis"
)]
pub async fn get_user_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserStats>, ApiError> {
    let stats = state.analyzer.user_stats(user_id).await.map_err(|e| {
        metrics::REQUESTS_FAILED.inc();
        ApiError::from(e)
    })?;
    Ok(Json(stats))
}
