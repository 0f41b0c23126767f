//! Diary entry analysis endpoint

use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::metrics;
use crate::models::{AnalysisResult, AnalyzeRequest};
use crate::AppState;

/// Analyze a diary entry and return the extracted actions
/// POST /analyze
#[utoipa::path(
    post,
    path = "/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis result", body = AnalysisResult),
        (status = 422, description = "Invalid request fields"),
        (status = 500, description = "Internal error")
    ),
    tag = "Analysis"
)]
pub async fn analyze_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, ApiError> {
    request.validate().map_err(|e| {
        metrics::REQUESTS_FAILED.inc();
        ApiError::validation(e)
    })?;

    metrics::REQUESTS_TOTAL.inc();
    let result = state
        .analyzer
        .analyze(request.user_id, &request.text, request.date)
        .await;
    metrics::REQUESTS_SUCCESS.inc();

    Ok(Json(result))
}
