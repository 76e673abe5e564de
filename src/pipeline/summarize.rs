use super::chunking::chunk_paragraphs;
use super::llm::{chat_with_retry, ChatRequest, LlmClient};
use super::prompt::{build_chunk_summary_prompt, build_consolidation_prompt, SUMMARY_SYSTEM_PROMPT};
use super::{PipelineError, PipelineSettings};

/// Summarize a long document into consolidated Markdown.
///
/// Chunks are processed one after another because each prompt carries the
/// previous chunk's summary. Failed chunks are skipped. If the final
/// consolidation call fails, the per-chunk sections are returned instead.
pub fn summarize_document(
    llm: &dyn LlmClient,
    settings: &PipelineSettings,
    text: &str,
) -> Result<String, PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let chunks = chunk_paragraphs(text, settings.summary_chunk_chars);
    tracing::info!(chunks = chunks.len(), "Summarizing document");

    let mut full_summary = String::new();
    let mut previous: Option<String> = None;
    let mut last_error = None;

    for (i, chunk) in chunks.iter().enumerate() {
        let request = ChatRequest::with_system(
            &settings.model,
            SUMMARY_SYSTEM_PROMPT,
            build_chunk_summary_prompt(i + 1, chunk, previous.as_deref()),
        );
        match chat_with_retry(llm, &request, settings.max_retries) {
            Ok(summary) => {
                full_summary.push_str(&format!("\n\n## Chunk {} Results\n\n{}", i + 1, summary.trim()));
                previous = Some(summary);
            }
            Err(e) => {
                tracing::warn!(chunk = i + 1, error = %e, "Chunk summary failed, skipping");
                last_error = Some(e);
            }
        }
    }

    if previous.is_none() {
        return Err(match last_error {
            Some(e) if chunks.len() == 1 => PipelineError::Llm(e),
            _ => PipelineError::AllChunksFailed(chunks.len()),
        });
    }

    let request = ChatRequest::with_system(
        &settings.model,
        SUMMARY_SYSTEM_PROMPT,
        build_consolidation_prompt(&full_summary),
    );
    match chat_with_retry(llm, &request, settings.max_retries) {
        Ok(consolidated) if !consolidated.trim().is_empty() => Ok(consolidated),
        Ok(_) => Ok(full_summary.trim().to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Consolidation failed, returning chunk summaries");
            Ok(full_summary.trim().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{LlmError, MockLlmClient};

    fn settings() -> PipelineSettings {
        PipelineSettings {
            summary_chunk_chars: 50,
            max_retries: 0,
            ..PipelineSettings::default()
        }
    }

    const DOC: &str = "Alpha section covers capital ratios.\n\nBeta section covers liquidity.";

    #[test]
    fn rolling_context_and_consolidation() {
        let llm = MockLlmClient::with_responder(|req, i| {
            let prompt = req.user_prompt().unwrap_or_default();
            Ok(if prompt.contains("consolidate") {
                "# Final rules".to_string()
            } else {
                format!("summary {}", i + 1)
            })
        });
        let summary = summarize_document(&llm, &settings(), DOC).unwrap();
        assert_eq!(summary, "# Final rules");

        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].user_prompt().unwrap().contains("first chunk"));
        assert!(requests[1]
            .user_prompt()
            .unwrap()
            .contains("previous chunks for context:\nsummary 1"));
        let consolidation = requests[2].user_prompt().unwrap();
        assert!(consolidation.contains("## Chunk 1 Results\n\nsummary 1"));
        assert!(consolidation.contains("## Chunk 2 Results\n\nsummary 2"));
        assert_eq!(requests[0].messages[0].content, SUMMARY_SYSTEM_PROMPT);
    }

    #[test]
    fn failed_consolidation_falls_back_to_sections() {
        let llm = MockLlmClient::with_responder(|_, i| {
            if i == 2 {
                Err(LlmError::Api {
                    status: 400,
                    body: "context too long".into(),
                })
            } else {
                Ok(format!("summary {}", i + 1))
            }
        });
        let summary = summarize_document(&llm, &settings(), DOC).unwrap();
        assert_eq!(
            summary,
            "## Chunk 1 Results\n\nsummary 1\n\n## Chunk 2 Results\n\nsummary 2"
        );
    }

    #[test]
    fn failed_chunk_is_skipped() {
        let llm = MockLlmClient::with_responder(|req, _| {
            let prompt = req.user_prompt().unwrap_or_default();
            if prompt.contains("Alpha") && !prompt.contains("consolidate") {
                Err(LlmError::Api {
                    status: 400,
                    body: "bad".into(),
                })
            } else if prompt.contains("consolidate") {
                Ok(prompt.to_string())
            } else {
                Ok("beta summary".into())
            }
        });
        let summary = summarize_document(&llm, &settings(), DOC).unwrap();
        assert!(summary.contains("## Chunk 2 Results\n\nbeta summary"));
        assert!(!summary.contains("## Chunk 1 Results"));
    }

    #[test]
    fn every_chunk_failing_is_an_error() {
        let llm = MockLlmClient::failing(LlmError::Api {
            status: 400,
            body: "bad".into(),
        });
        let err = summarize_document(&llm, &settings(), DOC).unwrap_err();
        assert!(matches!(err, PipelineError::AllChunksFailed(2)));

        let err = summarize_document(&llm, &settings(), "Short text.").unwrap_err();
        assert!(matches!(err, PipelineError::Llm(_)));
    }

    #[test]
    fn empty_text_is_rejected() {
        let llm = MockLlmClient::new("x");
        assert!(matches!(
            summarize_document(&llm, &settings(), ""),
            Err(PipelineError::EmptyInput)
        ));
    }
}
