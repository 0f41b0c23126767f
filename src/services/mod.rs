pub mod analyzer;
pub mod cache;
pub mod fusion;
pub mod heuristic;
pub mod history;
pub mod llm;
pub mod postprocessor;
pub mod preprocessor;

pub use analyzer::TextAnalyzer;
pub use cache::ResultCache;
pub use fusion::FusionService;
pub use heuristic::HeuristicParser;
pub use history::{HistoryStore, SqliteHistoryStore};
pub use llm::{LlmClient, LlmError, LlmParser, MockLlmParser, OpenAiLlmParser};
pub use postprocessor::Postprocessor;
pub use preprocessor::TextPreprocessor;
