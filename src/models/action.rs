//! Domain model for extracted actions
//!
//! Everything the pipeline exchanges between stages lives here: raw parser
//! output, enriched final actions, parse/analysis results and the persistent
//! history template row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// ============================================================================
// Enums
// ============================================================================

/// Kind of extracted action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Ordinary action, scored by duration
    Activity,
    /// Significant accomplishment, scored by a discrete weight
    Achievement,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Achievement => "achievement",
        }
    }
}

/// Provenance of the minute estimate on a final action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TimeSource {
    /// Explicit duration found in the text with high confidence
    Text,
    /// Running average from the per-user template history
    History,
    /// Parser estimate (any confidence)
    Model,
    /// Configured fallback
    Default,
}

impl TimeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::History => "history",
            Self::Model => "model",
            Self::Default => "default",
        }
    }

    /// Merge priority used by the postprocessor: text > history > model > default
    pub fn priority(&self) -> u8 {
        match self {
            Self::Text => 4,
            Self::History => 3,
            Self::Model => 2,
            Self::Default => 1,
        }
    }
}

/// Which parser produced a raw action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSource {
    Heuristic,
    Llm,
    Unknown,
}

impl ActionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Llm => "llm",
            Self::Unknown => "unknown",
        }
    }
}

// ============================================================================
// Parser output
// ============================================================================

/// Intermediate action record, exchanged between the parsers and fusion
#[derive(Debug, Clone)]
pub struct RawAction {
    pub category: String,
    pub subcategory: Option<String>,
    pub action: String,
    pub action_type: ActionType,
    pub estimated_time_minutes: Option<i64>,
    pub confidence: f64,
    pub achievement_weight: Option<i64>,
    pub source: ActionSource,
}

/// Result of a single parser run
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub actions: Vec<RawAction>,
    /// Mean confidence over the emitted actions, 0.0 when none
    pub confidence: f64,
    pub latency_ms: i64,
    pub errors: Vec<String>,
}

/// Result of an LLM parser run; extends [`ParseResult`] with model metadata
#[derive(Debug, Clone, Default)]
pub struct LlmParseResult {
    pub actions: Vec<RawAction>,
    pub confidence: f64,
    pub latency_ms: i64,
    pub errors: Vec<String>,
    pub model_name: Option<String>,
    pub tokens_used: Option<i64>,
}

/// Mean confidence over a set of raw actions, 0.0 for an empty set
pub fn mean_confidence(actions: &[RawAction]) -> f64 {
    if actions.is_empty() {
        return 0.0;
    }
    actions.iter().map(|a| a.confidence).sum::<f64>() / actions.len() as f64
}

// ============================================================================
// Final result
// ============================================================================

/// Finalized action returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Action {
    pub category: String,
    pub subcategory: Option<String>,
    pub action: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub estimated_time_minutes: i64,
    pub time_source: TimeSource,
    pub confidence: f64,
    pub achievement_weight: Option<i64>,
    pub points: f64,
}

/// Metadata about one analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AnalysisMeta {
    pub used_heuristics: Vec<String>,
    pub used_llm: bool,
    pub llm_latency_ms: Option<i64>,
    pub heuristic_latency_ms: Option<i64>,
    pub errors: Vec<String>,
}

/// Complete analysis result for one diary entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResult {
    pub user_id: i64,
    pub date: NaiveDate,
    /// Always `null`: the raw entry is never echoed back or persisted
    pub raw_text: Option<String>,
    pub actions: Vec<Action>,
    pub meta: AnalysisMeta,
}

// ============================================================================
// History template
// ============================================================================

/// Persistent per-user running average for one normalized action text.
/// `user_id = 0` holds global templates shared by every user.
#[derive(Debug, Clone, FromRow)]
pub struct ActionTemplate {
    pub id: i64,
    pub user_id: i64,
    pub normalized_text: String,
    pub avg_time_minutes: f64,
    pub occurrences: i64,
    pub last_seen: DateTime<Utc>,
}

/// Aggregate template statistics for one user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserStats {
    pub user_id: i64,
    pub total_templates: i64,
    pub total_actions: i64,
}
