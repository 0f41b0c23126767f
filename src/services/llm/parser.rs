//! LLM parser: prompt construction, retry policy and response validation

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::client::LlmClient;
use super::LlmError;
use crate::config::LlmConfig;
use crate::models::{mean_confidence, ActionSource, ActionType, LlmParseResult, RawAction};

/// Backoff parameters for transient failures: 0.5s, 1s, 2s, 2s, ...
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(2);

/// Interface for LLM-based parsing
#[async_trait]
pub trait LlmParser: Send + Sync {
    /// Parse text with the LLM. Never fails: transport or protocol problems
    /// come back as an empty result with populated `errors`.
    async fn parse_with_llm(&self, text: &str) -> LlmParseResult;
}

// ============================================================================
// Response schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct LlmResponseSchema {
    actions: Vec<LlmActionSchema>,
}

#[derive(Debug, Deserialize)]
struct LlmActionSchema {
    category: String,
    #[serde(default)]
    subcategory: Option<String>,
    action: String,
    #[serde(rename = "type")]
    action_type: String,
    estimated_time_minutes: i64,
    confidence: f64,
    #[serde(default)]
    achievement_weight: Option<i64>,
}

/// Decode and validate a JSON message content into raw actions.
/// Unknown `type` values fall back to `activity`; confidence is clamped.
fn parse_content(content: &str) -> Result<Vec<RawAction>, LlmError> {
    let parsed: LlmResponseSchema = serde_json::from_str(content)
        .map_err(|e| LlmError::Parse(format!("Invalid LLM response format: {e}")))?;

    Ok(parsed
        .actions
        .into_iter()
        .map(|a| RawAction {
            category: a.category,
            subcategory: a.subcategory,
            action: a.action,
            action_type: match a.action_type.as_str() {
                "achievement" => ActionType::Achievement,
                _ => ActionType::Activity,
            },
            estimated_time_minutes: Some(a.estimated_time_minutes),
            confidence: a.confidence.clamp(0.0, 1.0),
            achievement_weight: a.achievement_weight,
            source: ActionSource::Llm,
        })
        .collect())
}

// ============================================================================
// OpenAI-compatible parser
// ============================================================================

/// LLM parser over an OpenAI-compatible backend
pub struct OpenAiLlmParser {
    client: LlmClient,
    model_name: String,
    max_retries: u32,
    examples_block: String,
}

impl OpenAiLlmParser {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            model_name: config.model.clone(),
            max_retries: config.max_retries,
            client: LlmClient::new(config),
            examples_block: build_examples_block(),
        }
    }

    async fn call_with_retry(&self, text: &str) -> Result<super::ChatCompletion, LlmError> {
        let user_prompt = self.build_user_prompt(text);
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 0;

        loop {
            match self.client.chat_completion(SYSTEM_PROMPT, &user_prompt).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "LLM call failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        self.max_retries,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(RETRY_MAX_DELAY);
                },
                Err(e) => return Err(e),
            }
        }
    }

    fn build_user_prompt(&self, text: &str) -> String {
        format!(
            "{}\n\nNow analyze this diary entry:\nInput: {}\nOutput:",
            self.examples_block, text
        )
    }
}

#[async_trait]
impl LlmParser for OpenAiLlmParser {
    async fn parse_with_llm(&self, text: &str) -> LlmParseResult {
        let start = Instant::now();

        let outcome = match self.call_with_retry(text).await {
            Ok(completion) => {
                parse_content(&completion.content).map(|actions| (actions, completion.total_tokens))
            },
            Err(e) => Err(e),
        };

        let latency_ms = start.elapsed().as_millis() as i64;

        match outcome {
            Ok((actions, tokens_used)) => LlmParseResult {
                confidence: mean_confidence(&actions),
                actions,
                latency_ms,
                errors: Vec::new(),
                model_name: Some(self.model_name.clone()),
                tokens_used,
            },
            Err(e) => LlmParseResult {
                actions: Vec::new(),
                confidence: 0.0,
                latency_ms,
                errors: vec![format!("LLM parsing failed: {e}")],
                model_name: None,
                tokens_used: None,
            },
        }
    }
}

// ============================================================================
// Mock parser
// ============================================================================

/// Scripted stand-in for the LLM backend. Wired in when no API key is
/// configured; tests script it with canned actions.
#[derive(Default)]
pub struct MockLlmParser {
    actions: Vec<RawAction>,
}

impl MockLlmParser {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_actions(actions: Vec<RawAction>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl LlmParser for MockLlmParser {
    async fn parse_with_llm(&self, _text: &str) -> LlmParseResult {
        let actions: Vec<RawAction> = self
            .actions
            .iter()
            .cloned()
            .map(|mut a| {
                a.source = ActionSource::Llm;
                a
            })
            .collect();

        LlmParseResult {
            confidence: mean_confidence(&actions),
            actions,
            latency_ms: 10,
            errors: Vec::new(),
            model_name: Some("mock".to_string()),
            tokens_used: None,
        }
    }
}

// ============================================================================
// Prompts
// ============================================================================

const SYSTEM_PROMPT: &str = r#"You are an assistant that extracts structured activities and achievements from a user's daily diary entry in Russian.

Your task:
1. Identify all activities and achievements mentioned in the text
2. For each action, determine:
   - category (e.g., спорт, учёба, готовка, работа, творчество, саморазвитие, социальное, дом)
   - subcategory (optional, e.g., бодибилдинг, математика, программирование)
   - action (short description of what was done)
   - type: "activity" (regular action) or "achievement" (significant accomplishment)
   - estimated_time_minutes (conservative estimate)
   - confidence (0.0 to 1.0, how certain you are)
   - achievement_weight (only for achievements, 5-25 based on significance)

Guidelines:
- Be conservative with time estimates
- Mark as achievement only if it's a significant accomplishment (first time, record, completion, etc.)
- Use confidence < 0.5 for ambiguous items
- Always output valid JSON following the schema
- Do not add extra commentary

Output format (JSON only):
{
  "actions": [
    {
      "category": "string",
      "subcategory": "string or null",
      "action": "string",
      "type": "activity or achievement",
      "estimated_time_minutes": number,
      "confidence": number (0.0-1.0),
      "achievement_weight": number or null (5-25 for achievements)
    }
  ]
}"#;

/// Three curated few-shot examples prepended to every user prompt
fn build_examples_block() -> String {
    let examples = [
        (
            "Сходил в зал, пожал сотку, приготовил курочку",
            json!({
                "actions": [
                    {
                        "category": "спорт",
                        "subcategory": null,
                        "action": "сходил в зал",
                        "type": "activity",
                        "estimated_time_minutes": 90,
                        "confidence": 0.95,
                        "achievement_weight": null
                    },
                    {
                        "category": "спорт",
                        "subcategory": "бодибилдинг",
                        "action": "пожал сотку",
                        "type": "achievement",
                        "estimated_time_minutes": 5,
                        "confidence": 0.9,
                        "achievement_weight": 15
                    },
                    {
                        "category": "готовка",
                        "subcategory": null,
                        "action": "приготовил курочку",
                        "type": "activity",
                        "estimated_time_minutes": 40,
                        "confidence": 0.9,
                        "achievement_weight": null
                    }
                ]
            }),
        ),
        (
            "Читал 2 часа по линейной алгебре, сделал домашку",
            json!({
                "actions": [
                    {
                        "category": "учёба",
                        "subcategory": "математика",
                        "action": "читал по линейной алгебре",
                        "type": "activity",
                        "estimated_time_minutes": 120,
                        "confidence": 0.95,
                        "achievement_weight": null
                    },
                    {
                        "category": "учёба",
                        "subcategory": null,
                        "action": "сделал домашку",
                        "type": "activity",
                        "estimated_time_minutes": 60,
                        "confidence": 0.85,
                        "achievement_weight": null
                    }
                ]
            }),
        ),
        (
            "Впервые пробежал 10 км без остановок!",
            json!({
                "actions": [
                    {
                        "category": "спорт",
                        "subcategory": "кардио",
                        "action": "пробежал 10 км без остановок",
                        "type": "achievement",
                        "estimated_time_minutes": 60,
                        "confidence": 0.95,
                        "achievement_weight": 20
                    }
                ]
            }),
        ),
    ];

    examples
        .iter()
        .enumerate()
        .map(|(i, (input, output))| {
            format!("Example {}:\nInput: {}\nOutput: {}", i + 1, input, output)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_response_content() {
        let content = r#"{
            "actions": [
                {
                    "category": "спорт",
                    "subcategory": "кардио",
                    "action": "пробежал 5 км",
                    "type": "activity",
                    "estimated_time_minutes": 30,
                    "confidence": 0.9,
                    "achievement_weight": null
                }
            ]
        }"#;

        let actions = parse_content(content).unwrap();
        assert_eq!(actions.len(), 1);
        let action = &actions[0];
        assert_eq!(action.category, "спорт");
        assert_eq!(action.subcategory.as_deref(), Some("кардио"));
        assert_eq!(action.action_type, ActionType::Activity);
        assert_eq!(action.estimated_time_minutes, Some(30));
        assert_eq!(action.source, ActionSource::Llm);
    }

    #[test]
    fn unknown_type_defaults_to_activity() {
        let content = r#"{"actions": [{"category": "спорт", "action": "гулял",
            "type": "promenade", "estimated_time_minutes": 20, "confidence": 0.5}]}"#;
        let actions = parse_content(content).unwrap();
        assert_eq!(actions[0].action_type, ActionType::Activity);
    }

    #[test]
    fn confidence_is_clamped() {
        let content = r#"{"actions": [
            {"category": "спорт", "action": "а", "type": "activity",
             "estimated_time_minutes": 10, "confidence": 1.7},
            {"category": "спорт", "action": "б", "type": "activity",
             "estimated_time_minutes": 10, "confidence": -0.3}]}"#;
        let actions = parse_content(content).unwrap();
        assert_eq!(actions[0].confidence, 1.0);
        assert_eq!(actions[1].confidence, 0.0);
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = parse_content("not json at all").unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn schema_mismatch_is_a_parse_error() {
        // actions missing entirely
        let err = parse_content(r#"{"items": []}"#).unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));

        // required field missing
        let err = parse_content(r#"{"actions": [{"category": "спорт"}]}"#).unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn examples_block_contains_three_examples() {
        let block = build_examples_block();
        assert!(block.contains("Example 1:"));
        assert!(block.contains("Example 3:"));
        assert!(!block.contains("Example 4:"));
        assert!(block.contains("пожал сотку"));
    }

    #[tokio::test]
    async fn mock_parser_marks_actions_as_llm_sourced() {
        let mock = MockLlmParser::with_actions(vec![RawAction {
            category: "спорт".to_string(),
            subcategory: None,
            action: "пробежал 10 км".to_string(),
            action_type: ActionType::Achievement,
            estimated_time_minutes: Some(60),
            confidence: 0.95,
            achievement_weight: Some(20),
            source: ActionSource::Unknown,
        }]);

        let result = mock.parse_with_llm("любой текст").await;
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].source, ActionSource::Llm);
        assert_eq!(result.model_name.as_deref(), Some("mock"));
    }

    #[tokio::test]
    async fn empty_mock_returns_empty_result() {
        let result = MockLlmParser::empty().parse_with_llm("текст").await;
        assert!(result.actions.is_empty());
        assert_eq!(result.confidence, 0.0);
    }
}
