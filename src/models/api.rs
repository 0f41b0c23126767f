//! API request and response schemas

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for `POST /analyze`
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AnalyzeRequest {
    /// User the diary entry belongs to
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,
    /// Diary entry text
    #[validate(length(min = 1, max = 10000, message = "text must be 1..10000 characters"))]
    pub text: String,
    /// Date of the entry, defaults to today
    pub date: Option<NaiveDate>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_user_id() {
        let req = AnalyzeRequest { user_id: 0, text: "Сходил в зал".to_string(), date: None };
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_empty_text() {
        let req = AnalyzeRequest { user_id: 1, text: String::new(), date: None };
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_oversized_text() {
        let req = AnalyzeRequest { user_id: 1, text: "а".repeat(10001), date: None };
        assert!(req.validate().is_err());
    }

    #[test]
    fn accepts_valid_request_with_date() {
        let req = AnalyzeRequest {
            user_id: 12345,
            text: "Сходил в зал, пожал сотку".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 11, 10),
        };
        assert!(req.validate().is_ok());
    }
}
