pub mod action;
pub mod api;

pub use action::{
    Action, ActionSource, ActionTemplate, ActionType, AnalysisMeta, AnalysisResult,
    LlmParseResult, ParseResult, RawAction, TimeSource, UserStats, mean_confidence,
};
pub use api::{AnalyzeRequest, HealthResponse};
