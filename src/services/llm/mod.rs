//! LLM-backed parsing
//!
//! Second tier of the pipeline: invoked only when the heuristic parser is
//! absent or unsure. Talks to any OpenAI-compatible chat completion endpoint
//! with a JSON-object response format.

pub mod client;
pub mod parser;

pub use client::{ChatCompletion, LlmClient};
pub use parser::{LlmParser, MockLlmParser, OpenAiLlmParser};

/// LLM transport and protocol errors
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM timeout after {0}s")]
    Timeout(u64),

    #[error("LLM rate limited, retry after {0}s")]
    RateLimited(u64),

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("LLM response parsing error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LlmError {
    /// Transient failures worth another attempt: timeouts, rate limits,
    /// transport drops and server-side errors. Protocol failures (invalid
    /// JSON, schema mismatch, other 4xx) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited(_) | Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Parse(_) | Self::Serialization(_) => false,
        }
    }
}
