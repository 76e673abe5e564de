use std::time::Duration;

use super::types::{ChatRequest, LlmClient};
use super::LlmError;

/// Base delay before the first retry; doubles on each further attempt.
const BASE_BACKOFF_MS: u64 = 500;

/// Call the LLM, retrying transient failures up to `max_retries` times.
/// Non-transient errors propagate immediately.
pub fn chat_with_retry(
    llm: &dyn LlmClient,
    request: &ChatRequest,
    max_retries: usize,
) -> Result<String, LlmError> {
    chat_with_backoff(llm, request, max_retries, Duration::from_millis(BASE_BACKOFF_MS))
}

pub(crate) fn chat_with_backoff(
    llm: &dyn LlmClient,
    request: &ChatRequest,
    max_retries: usize,
    base_backoff: Duration,
) -> Result<String, LlmError> {
    let mut attempt = 0;
    loop {
        match llm.chat(request) {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() && attempt < max_retries => {
                let delay = base_backoff * 2u32.saturating_pow(attempt as u32);
                tracing::warn!(
                    client = llm.name(),
                    model = %request.model,
                    attempt = attempt + 1,
                    error = %e,
                    "LLM call failed, retrying"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
