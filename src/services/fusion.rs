//! Parser fusion and duration enrichment
//!
//! Decides whether the LLM tier runs, selects which parser's output to keep,
//! and turns raw actions into final ones by resolving the duration source
//! (text > history > model > default) and computing points.

use std::sync::Arc;

use crate::config::AnalysisConfig;
use crate::models::{Action, ActionType, RawAction, TimeSource};
use crate::services::history::HistoryStore;
use crate::services::preprocessor::TextPreprocessor;

/// Durations found in the text are only trusted above this confidence
const TEXT_TIME_MIN_CONFIDENCE: f64 = 0.7;

pub struct FusionService {
    history: Arc<dyn HistoryStore>,
    preprocessor: TextPreprocessor,
    config: AnalysisConfig,
}

impl FusionService {
    pub fn new(history: Arc<dyn HistoryStore>, config: AnalysisConfig) -> Self {
        Self { history, preprocessor: TextPreprocessor::new(false), config }
    }

    /// The LLM runs when heuristics found nothing, or found something but
    /// below the configured confidence threshold.
    pub fn should_use_llm(&self, heuristic_confidence: f64, heuristic_action_count: usize) -> bool {
        if heuristic_action_count == 0 {
            return true;
        }
        heuristic_confidence < self.config.heuristic_confidence_threshold
    }

    /// Fuse the two parser outputs into final actions. A successful LLM run
    /// is trusted to be complete, so its list replaces the heuristic one.
    pub async fn fuse(
        &self,
        user_id: i64,
        heuristic_actions: Vec<RawAction>,
        llm_actions: Vec<RawAction>,
    ) -> Vec<Action> {
        let selected = if llm_actions.is_empty() { heuristic_actions } else { llm_actions };

        let mut actions = Vec::with_capacity(selected.len());
        for raw in selected {
            actions.push(self.enrich(user_id, raw).await);
        }
        actions
    }

    async fn enrich(&self, user_id: i64, raw: RawAction) -> Action {
        let (time_minutes, time_source) = self.determine_time(user_id, &raw).await;

        let achievement_weight = match raw.action_type {
            ActionType::Achievement => {
                Some(raw.achievement_weight.unwrap_or(self.config.achievement_default_weight))
            },
            ActionType::Activity => raw.achievement_weight,
        };

        let points = match raw.action_type {
            ActionType::Achievement => {
                achievement_weight.unwrap_or(self.config.achievement_default_weight) as f64
            },
            ActionType::Activity => time_minutes as f64 / 10.0,
        };

        Action {
            category: raw.category,
            subcategory: raw.subcategory,
            action: raw.action,
            action_type: raw.action_type,
            estimated_time_minutes: time_minutes,
            time_source,
            confidence: raw.confidence,
            achievement_weight,
            points,
        }
    }

    /// Duration source priority, first satisfied clause wins:
    /// 1. text    — explicit duration with confidence >= 0.7
    /// 2. history — per-user (or global) running average
    /// 3. model   — parser estimate at any confidence
    /// 4. default — configured fallback
    async fn determine_time(&self, user_id: i64, raw: &RawAction) -> (i64, TimeSource) {
        if let Some(minutes) = raw.estimated_time_minutes {
            if raw.confidence >= TEXT_TIME_MIN_CONFIDENCE {
                return (minutes, TimeSource::Text);
            }
        }

        let normalized = self.preprocessor.normalize_text(&raw.action);
        let history_time = self
            .history
            .get_average_time(user_id, &normalized)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("History lookup failed for user {}: {}", user_id, e);
                None
            });
        if let Some(minutes) = history_time {
            return (minutes, TimeSource::History);
        }

        if let Some(minutes) = raw.estimated_time_minutes {
            return (minutes, TimeSource::Model);
        }

        (self.config.default_time_minutes, TimeSource::Default)
    }
}
