//! Pipeline orchestration
//!
//! One `analyze` call runs preprocessor -> heuristic parser -> (conditional)
//! LLM parser -> fusion -> postprocessor, records observed durations into
//! history and round-trips the final result through the cache. Every
//! downstream failure degrades the result instead of failing the request.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::config::{AnalysisConfig, CacheConfig};
use crate::metrics;
use crate::models::{AnalysisMeta, AnalysisResult, UserStats};
use crate::services::cache::ResultCache;
use crate::services::fusion::FusionService;
use crate::services::heuristic::HeuristicParser;
use crate::services::history::HistoryStore;
use crate::services::llm::LlmParser;
use crate::services::postprocessor::Postprocessor;
use crate::services::preprocessor::TextPreprocessor;

/// Heuristic stages reported in analysis metadata
const HEURISTIC_NAMES: [&str; 3] = ["keyword_match", "time_extraction", "category_detection"];

pub struct TextAnalyzer {
    preprocessor: TextPreprocessor,
    heuristic_parser: HeuristicParser,
    llm_parser: Arc<dyn LlmParser>,
    fusion: FusionService,
    postprocessor: Postprocessor,
    history: Arc<dyn HistoryStore>,
    cache: Arc<ResultCache>,
    analysis: AnalysisConfig,
    cache_config: CacheConfig,
}

impl TextAnalyzer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        preprocessor: TextPreprocessor,
        heuristic_parser: HeuristicParser,
        llm_parser: Arc<dyn LlmParser>,
        fusion: FusionService,
        postprocessor: Postprocessor,
        history: Arc<dyn HistoryStore>,
        cache: Arc<ResultCache>,
        analysis: AnalysisConfig,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            preprocessor,
            heuristic_parser,
            llm_parser,
            fusion,
            postprocessor,
            history,
            cache,
            analysis,
            cache_config,
        }
    }

    /// Analyze one diary entry and return the extracted actions
    pub async fn analyze(
        &self,
        user_id: i64,
        text: &str,
        date: Option<NaiveDate>,
    ) -> AnalysisResult {
        let date = date.unwrap_or_else(|| Local::now().date_naive());

        let cache_key =
            ResultCache::fingerprint(user_id, &self.preprocessor.normalize_text(text));
        if self.cache_config.enabled {
            if let Some(cached) = self.get_cached(&cache_key).await {
                metrics::CACHE_HITS.inc();
                return cached;
            }
            metrics::CACHE_MISSES.inc();
        }

        let processed = self.preprocessor.preprocess(text);

        let mut meta = AnalysisMeta {
            used_heuristics: HEURISTIC_NAMES.iter().map(|s| s.to_string()).collect(),
            ..AnalysisMeta::default()
        };

        let heuristic_result = self.heuristic_parser.parse(user_id, &processed);
        meta.heuristic_latency_ms = Some(heuristic_result.latency_ms);

        let mut llm_actions = Vec::new();
        let wants_llm = self
            .fusion
            .should_use_llm(heuristic_result.confidence, heuristic_result.actions.len());
        if wants_llm && self.analysis.use_llm_fallback {
            metrics::LLM_CALLS_TOTAL.inc();
            let llm_result = self.llm_parser.parse_with_llm(&processed).await;
            meta.used_llm = true;
            meta.llm_latency_ms = Some(llm_result.latency_ms);
            if let Some(tokens) = llm_result.tokens_used {
                metrics::LLM_TOKENS_USED.add(tokens.max(0) as u64);
            }
            if !llm_result.errors.is_empty() {
                metrics::LLM_ERRORS_TOTAL.inc();
                meta.errors.extend(llm_result.errors);
            }
            llm_actions = llm_result.actions;
        }

        let fused = self
            .fusion
            .fuse(user_id, heuristic_result.actions, llm_actions)
            .await;
        let final_actions = self.postprocessor.process(fused);

        // project observed durations into history; failures degrade, never fail
        for action in &final_actions {
            if action.estimated_time_minutes > 0 {
                if let Err(e) = self
                    .history
                    .record_action(user_id, &action.action, action.estimated_time_minutes)
                    .await
                {
                    tracing::warn!("Failed to record action for user {}: {}", user_id, e);
                }
            }
        }

        let result = AnalysisResult {
            user_id,
            date,
            raw_text: None,
            actions: final_actions,
            meta,
        };

        if self.cache_config.enabled {
            self.cache_result(&cache_key, &result).await;
        }

        result
    }

    /// Template statistics for one user
    pub async fn user_stats(&self, user_id: i64) -> Result<UserStats, sqlx::Error> {
        self.history.user_stats(user_id).await
    }

    async fn get_cached(&self, cache_key: &str) -> Option<AnalysisResult> {
        let cached_json = self.cache.get(cache_key).await?;
        match serde_json::from_str(&cached_json) {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::debug!("Discarding undecodable cache entry {}: {}", cache_key, e);
                None
            },
        }
    }

    async fn cache_result(&self, cache_key: &str, result: &AnalysisResult) {
        match serde_json::to_string(result) {
            Ok(json) => {
                self.cache
                    .set(cache_key, &json, Some(self.cache_config.ttl_seconds))
                    .await
            },
            Err(e) => tracing::warn!("Failed to serialize result for caching: {}", e),
        }
    }

    /// Assemble the full pipeline from configuration.
    ///
    /// The mock LLM parser is wired in when no API key is configured; a
    /// failed Redis connection degrades to the in-process cache.
    pub async fn from_config(config: &crate::config::Config, pool: sqlx::SqlitePool) -> Self {
        use crate::services::history::SqliteHistoryStore;
        use crate::services::llm::{MockLlmParser, OpenAiLlmParser};

        let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(pool));

        let llm_parser: Arc<dyn LlmParser> = if config.llm.api_key.is_empty() {
            tracing::warn!("No LLM API key configured, using the mock LLM parser");
            Arc::new(MockLlmParser::empty())
        } else {
            Arc::new(OpenAiLlmParser::new(config.llm.clone()))
        };

        let cache = if config.cache.enabled {
            Arc::new(ResultCache::connect(&config.cache.redis_url, config.cache.ttl_seconds).await)
        } else {
            Arc::new(ResultCache::in_memory(config.cache.ttl_seconds))
        };

        Self::new(
            TextPreprocessor::new(config.analysis.pii_redaction_enabled),
            HeuristicParser::new(),
            llm_parser,
            FusionService::new(Arc::clone(&history), config.analysis.clone()),
            Postprocessor::default(),
            history,
            cache,
            config.analysis.clone(),
            config.cache.clone(),
        )
    }
}
