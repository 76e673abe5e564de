//! Chat-completions client layer.
//!
//! Everything that talks to the hosted model goes through [`LlmClient`], so
//! the pipeline can run against [`MockLlmClient`] in tests.

pub mod openrouter;
pub mod retry;
pub mod types;

pub use openrouter::*;
pub use retry::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("No API key configured (set OPENROUTER_API_KEY)")]
    MissingApiKey,

    #[error("Cannot reach LLM API at {0}")]
    Connection(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("LLM API returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("LLM returned an empty completion")]
    EmptyCompletion,
}

impl LlmError {
    /// Transient failures worth another attempt. Malformed output and
    /// client-side HTTP errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Connection(_) | LlmError::Timeout(_) | LlmError::HttpClient(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::MissingApiKey
            | LlmError::MalformedResponse(_)
            | LlmError::EmptyCompletion => false,
        }
    }
}
