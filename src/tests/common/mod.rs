// Common test utilities and helpers

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AnalysisConfig, CacheConfig};
use crate::services::analyzer::TextAnalyzer;
use crate::services::cache::ResultCache;
use crate::services::fusion::FusionService;
use crate::services::heuristic::HeuristicParser;
use crate::services::history::{HistoryStore, SqliteHistoryStore};
use crate::services::llm::LlmParser;
use crate::services::postprocessor::Postprocessor;
use crate::services::preprocessor::TextPreprocessor;
use crate::db;

/// Create an in-memory SQLite database for testing
pub async fn create_test_db() -> SqlitePool {
    // a single connection keeps the in-memory database shared
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(3))
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    db::init_schema(&pool)
        .await
        .expect("Failed to initialize schema");

    pool
}

/// Assemble a full pipeline with an in-memory history, an in-process cache
/// and the given LLM parser. PII redaction on, defaults everywhere else.
pub async fn create_test_analyzer(llm_parser: Arc<dyn LlmParser>) -> TextAnalyzer {
    create_test_analyzer_with(llm_parser, AnalysisConfig::default(), true).await
}

pub async fn create_test_analyzer_with(
    llm_parser: Arc<dyn LlmParser>,
    analysis: AnalysisConfig,
    cache_enabled: bool,
) -> TextAnalyzer {
    let pool = create_test_db().await;
    let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(pool));
    let cache_config = CacheConfig { enabled: cache_enabled, ..CacheConfig::default() };

    TextAnalyzer::new(
        TextPreprocessor::new(analysis.pii_redaction_enabled),
        HeuristicParser::new(),
        llm_parser,
        FusionService::new(Arc::clone(&history), analysis.clone()),
        Postprocessor::default(),
        history,
        Arc::new(ResultCache::in_memory(cache_config.ttl_seconds)),
        analysis,
        cache_config,
    )
}
