//! Mnemo Library
//!
//! Analysis pipeline for short free-form diary entries: extracts structured
//! actions with categories, duration estimates and points.

use sqlx::SqlitePool;
use std::sync::Arc;

pub mod config;
pub mod db;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::Config;
pub use services::{
    FusionService, HeuristicParser, HistoryStore, LlmParser, MockLlmParser, OpenAiLlmParser,
    Postprocessor, ResultCache, SqliteHistoryStore, TextAnalyzer, TextPreprocessor,
};

/// Application shared state
///
/// Rust's type system is the DI container: the analyzer owns the assembled
/// pipeline, everything shared sits behind an Arc.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub analyzer: Arc<TextAnalyzer>,
    pub metrics_enabled: bool,
}
