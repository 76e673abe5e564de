pub mod anomaly;
pub mod chunking;
pub mod concurrency;
pub mod extraction;
pub mod llm;
pub mod processor; // Text → requirements → rules → code
pub mod prompt;
pub mod repair;
pub mod requirements;
pub mod rules;
pub mod summarize;
pub mod types;

pub use processor::*;
pub use types::*;

use thiserror::Error;

use self::extraction::ExtractionError;
use self::llm::LlmError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Input is empty")]
    EmptyInput,

    #[error("All {0} chunks failed")]
    AllChunksFailed(usize),

    #[error("Worker thread panicked")]
    WorkerPanicked,
}

/// Knobs shared by every LLM-backed stage.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: String,
    pub anomaly_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub summary_chunk_chars: usize,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub max_retries: usize,
    pub max_pdf_pages: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model: crate::config::DEFAULT_MODEL.to_string(),
            anomaly_model: crate::config::DEFAULT_ANOMALY_MODEL.to_string(),
            chunk_size: 2000,
            chunk_overlap: 200,
            summary_chunk_chars: 3000,
            batch_size: 10,
            max_concurrency: 4,
            max_retries: 2,
            max_pdf_pages: 50,
        }
    }
}

/// First `max` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
