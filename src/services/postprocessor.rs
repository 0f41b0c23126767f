//! Action normalization, fuzzy deduplication and invariant repair
//!
//! Runs after fusion, in three passes: synonym canonicalization, in-place
//! merging of near-duplicate actions, and a final validation pass that
//! clamps out-of-range fields and re-derives points.

use strsim::normalized_levenshtein;

use crate::models::{Action, ActionType};

/// Substring synonym table applied case-preservingly at sentence start
const SYNONYMS: &[(&str, &str)] = &[
    ("зале", "зал"),
    ("спортзале", "зал"),
    ("качалке", "зал"),
    ("gym", "зал"),
    ("книжку", "книгу"),
    ("учебник", "книгу"),
];

const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

pub struct Postprocessor {
    similarity_threshold: f64,
}

impl Default for Postprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl Postprocessor {
    pub fn new(similarity_threshold: f64) -> Self {
        Self { similarity_threshold }
    }

    pub fn process(&self, actions: Vec<Action>) -> Vec<Action> {
        if actions.is_empty() {
            return actions;
        }

        let actions = Self::normalize_actions(actions);
        let actions = self.deduplicate_actions(actions);
        Self::validate_actions(actions)
    }

    // ------------------------------------------------------------------
    // Pass 1: normalization
    // ------------------------------------------------------------------

    fn normalize_actions(actions: Vec<Action>) -> Vec<Action> {
        actions
            .into_iter()
            .map(|mut action| {
                action.action = Self::apply_synonyms(action.action.trim());
                action
            })
            .collect()
    }

    fn apply_synonyms(text: &str) -> String {
        let mut result = text.to_string();
        for (old, new) in SYNONYMS {
            if result.to_lowercase().contains(old) {
                result = result.replace(old, new);
                result = result.replace(&capitalize(old), &capitalize(new));
            }
        }
        result
    }

    // ------------------------------------------------------------------
    // Pass 2: deduplication
    // ------------------------------------------------------------------

    fn deduplicate_actions(&self, actions: Vec<Action>) -> Vec<Action> {
        if actions.len() <= 1 {
            return actions;
        }

        let mut unique: Vec<Action> = Vec::with_capacity(actions.len());
        for action in actions {
            match unique.iter().position(|existing| self.are_similar(existing, &action)) {
                Some(idx) => {
                    let merged = merge_actions(&unique[idx], &action);
                    unique[idx] = merged;
                },
                None => unique.push(action),
            }
        }
        unique
    }

    fn are_similar(&self, a: &Action, b: &Action) -> bool {
        if a.category != b.category || a.action_type != b.action_type {
            return false;
        }
        let similarity =
            normalized_levenshtein(&a.action.to_lowercase(), &b.action.to_lowercase());
        similarity >= self.similarity_threshold
    }

    // ------------------------------------------------------------------
    // Pass 3: validation
    // ------------------------------------------------------------------

    fn validate_actions(actions: Vec<Action>) -> Vec<Action> {
        actions
            .into_iter()
            .map(|mut action| {
                if action.estimated_time_minutes < 0 {
                    action.estimated_time_minutes = 10;
                }
                action.confidence = action.confidence.clamp(0.0, 1.0);

                let correct_points = match action.action_type {
                    ActionType::Achievement => action.achievement_weight.unwrap_or(10) as f64,
                    ActionType::Activity => action.estimated_time_minutes as f64 / 10.0,
                };
                if (action.points - correct_points).abs() > 0.01 {
                    action.points = correct_points;
                }
                action
            })
            .collect()
    }
}

/// Merge two similar actions in place. Time fields follow the operand with
/// the higher-priority time source; the remaining fields follow the operand
/// with the higher confidence, inheriting the lower-confidence operand's
/// subcategory when the winner has none.
fn merge_actions(a: &Action, b: &Action) -> Action {
    let better_time = if a.time_source.priority() >= b.time_source.priority() { a } else { b };
    let better_confidence = if a.confidence >= b.confidence { a } else { b };
    let other = if std::ptr::eq(better_confidence, a) { b } else { a };

    Action {
        category: better_confidence.category.clone(),
        subcategory: better_confidence
            .subcategory
            .clone()
            .or_else(|| other.subcategory.clone()),
        action: better_confidence.action.clone(),
        action_type: better_confidence.action_type,
        estimated_time_minutes: better_time.estimated_time_minutes,
        time_source: better_time.time_source,
        confidence: a.confidence.max(b.confidence),
        achievement_weight: better_confidence.achievement_weight,
        points: better_time.points,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSource;

    fn action(text: &str, time_source: TimeSource, time: i64, confidence: f64) -> Action {
        Action {
            category: "спорт".to_string(),
            subcategory: None,
            action: text.to_string(),
            action_type: ActionType::Activity,
            estimated_time_minutes: time,
            time_source,
            confidence,
            achievement_weight: None,
            points: time as f64 / 10.0,
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(Postprocessor::default().process(vec![]).is_empty());
    }

    #[test]
    fn applies_synonyms_preserving_capitalization() {
        let processed = Postprocessor::default()
            .process(vec![action("Качалке сегодня досталось", TimeSource::Default, 10, 0.7)]);
        assert_eq!(processed[0].action, "Зал сегодня досталось");

        let processed = Postprocessor::default()
            .process(vec![action("читал книжку", TimeSource::Default, 10, 0.7)]);
        assert_eq!(processed[0].action, "читал книгу");
    }

    #[test]
    fn trims_action_text() {
        let processed = Postprocessor::default()
            .process(vec![action("  сходил в зал  ", TimeSource::Default, 10, 0.7)]);
        assert_eq!(processed[0].action, "сходил в зал");
    }

    #[test]
    fn merges_similar_actions_in_place() {
        let processed = Postprocessor::default().process(vec![
            action("сходил в зал", TimeSource::Text, 90, 0.9),
            action("сходил в зал!", TimeSource::Default, 10, 0.7),
        ]);
        assert_eq!(processed.len(), 1);
        // text source has priority, so its time fields survive
        assert_eq!(processed[0].estimated_time_minutes, 90);
        assert_eq!(processed[0].time_source, TimeSource::Text);
        assert!((processed[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn time_fields_win_by_source_even_against_confidence() {
        let processed = Postprocessor::default().process(vec![
            action("сходил в зал", TimeSource::Default, 10, 0.95),
            action("сходил в зал.", TimeSource::History, 45, 0.6),
        ]);
        assert_eq!(processed.len(), 1);
        // history time outranks default, text fields follow the confident one
        assert_eq!(processed[0].time_source, TimeSource::History);
        assert_eq!(processed[0].estimated_time_minutes, 45);
        assert_eq!(processed[0].action, "сходил в зал");
    }

    #[test]
    fn subcategory_inherited_from_lower_confidence_operand() {
        let mut a = action("качал железо", TimeSource::Text, 60, 0.9);
        let mut b = action("качал железо!", TimeSource::Default, 10, 0.7);
        a.subcategory = None;
        b.subcategory = Some("бодибилдинг".to_string());

        let processed = Postprocessor::default().process(vec![a, b]);
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].subcategory.as_deref(), Some("бодибилдинг"));
    }

    #[test]
    fn different_categories_never_merge() {
        let mut a = action("готовил обед", TimeSource::Default, 10, 0.7);
        a.category = "готовка".to_string();
        let b = action("готовил обед", TimeSource::Default, 10, 0.7);

        let processed = Postprocessor::default().process(vec![a, b]);
        assert_eq!(processed.len(), 2);
    }

    #[test]
    fn different_types_never_merge() {
        let a = action("пробежал 10 км", TimeSource::Default, 10, 0.7);
        let mut b = action("пробежал 10 км", TimeSource::Default, 10, 0.8);
        b.action_type = ActionType::Achievement;
        b.achievement_weight = Some(20);
        b.points = 20.0;

        let processed = Postprocessor::default().process(vec![a, b]);
        assert_eq!(processed.len(), 2);
    }

    #[test]
    fn dissimilar_texts_are_kept_apart() {
        let processed = Postprocessor::default().process(vec![
            action("сходил в зал", TimeSource::Default, 10, 0.7),
            action("плавал в бассейне", TimeSource::Default, 10, 0.7),
        ]);
        assert_eq!(processed.len(), 2);
    }

    #[test]
    fn processing_is_idempotent() {
        let input = vec![
            action("сходил в зал", TimeSource::Text, 90, 0.9),
            action("сходил в зал!", TimeSource::Default, 10, 0.7),
            action("плавал в бассейне", TimeSource::Model, 30, 0.6),
        ];
        let postprocessor = Postprocessor::default();
        let once = postprocessor.process(input);
        let twice = postprocessor.process(once.clone());
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.action, b.action);
            assert_eq!(a.estimated_time_minutes, b.estimated_time_minutes);
            assert!((a.points - b.points).abs() < 1e-9);
        }
    }

    #[test]
    fn negative_time_is_repaired() {
        let mut broken = action("сходил в зал", TimeSource::Model, -5, 0.7);
        broken.points = -0.5;
        let processed = Postprocessor::default().process(vec![broken]);
        assert_eq!(processed[0].estimated_time_minutes, 10);
        assert!((processed[0].points - 1.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_clamped() {
        let mut broken = action("сходил в зал", TimeSource::Model, 30, 1.4);
        let processed = Postprocessor::default().process(vec![broken.clone()]);
        assert_eq!(processed[0].confidence, 1.0);

        broken.confidence = -0.2;
        let processed = Postprocessor::default().process(vec![broken]);
        assert_eq!(processed[0].confidence, 0.0);
    }

    #[test]
    fn points_are_recomputed_when_inconsistent() {
        let mut activity = action("читал", TimeSource::Text, 120, 0.9);
        activity.points = 3.0;
        let processed = Postprocessor::default().process(vec![activity]);
        assert!((processed[0].points - 12.0).abs() < 1e-9);

        let mut achievement = action("впервые пробежал", TimeSource::Default, 10, 0.8);
        achievement.action_type = ActionType::Achievement;
        achievement.achievement_weight = Some(25);
        achievement.points = 1.0;
        let processed = Postprocessor::default().process(vec![achievement]);
        assert!((processed[0].points - 25.0).abs() < 1e-9);
    }
}
