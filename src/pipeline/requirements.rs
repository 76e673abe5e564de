use std::collections::HashSet;

use super::chunking::{estimate_tokens, RecursiveSplitter};
use super::concurrency::map_ordered;
use super::llm::{chat_with_retry, ChatRequest, LlmClient};
use super::prompt::build_requirements_prompt;
use super::repair::{parse_items_lenient, parse_llm_json, value_to_list};
use super::types::Requirement;
use super::{PipelineError, PipelineSettings};

const REQUIREMENTS_TEMPERATURE: f32 = 0.3;
const REQUIREMENTS_MAX_TOKENS: u32 = 2000;

/// Extract structured requirements from regulation text.
///
/// The text is split with overlap and each chunk is sent independently;
/// results keep chunk order. A failing chunk is skipped, but if every chunk
/// fails the last error is returned.
pub fn extract_requirements(
    llm: &dyn LlmClient,
    settings: &PipelineSettings,
    text: &str,
) -> Result<Vec<Requirement>, PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let chunks = RecursiveSplitter::new(settings.chunk_size, settings.chunk_overlap).split(text);
    tracing::info!(
        chunks = chunks.len(),
        est_tokens = estimate_tokens(text),
        model = %settings.model,
        "Extracting requirements"
    );

    let outcomes = map_ordered(&chunks, settings.max_concurrency, |index, chunk| {
        extract_chunk(llm, settings, chunk).inspect_err(|e| {
            tracing::warn!(chunk = index + 1, error = %e, "Requirement extraction failed for chunk");
        })
    })?;

    let total = outcomes.len();
    let mut requirements = Vec::new();
    let mut last_error = None;
    let mut failed = 0;
    for outcome in outcomes {
        match outcome {
            Ok(items) => requirements.extend(items),
            Err(e) => {
                failed += 1;
                last_error = Some(e);
            }
        }
    }

    if failed == total {
        return Err(last_error.unwrap_or(PipelineError::AllChunksFailed(total)));
    }

    let requirements = dedupe(requirements);
    tracing::info!(
        count = requirements.len(),
        failed_chunks = failed,
        "Requirements extracted"
    );
    Ok(requirements)
}

fn extract_chunk(
    llm: &dyn LlmClient,
    settings: &PipelineSettings,
    chunk: &str,
) -> Result<Vec<Requirement>, PipelineError> {
    let request = ChatRequest::user(&settings.model, build_requirements_prompt(chunk))
        .temperature(REQUIREMENTS_TEMPERATURE)
        .max_tokens(REQUIREMENTS_MAX_TOKENS);
    let response = chat_with_retry(llm, &request, settings.max_retries)?;
    let value = parse_llm_json(&response)?;
    Ok(parse_items_lenient(value_to_list(value, "requirements")))
}

/// Overlapping chunks repeat requirements; keep the first occurrence.
fn dedupe(requirements: Vec<Requirement>) -> Vec<Requirement> {
    let mut seen = HashSet::new();
    requirements
        .into_iter()
        .filter(|r| {
            seen.insert((
                r.requirement.trim().to_lowercase(),
                r.rule.trim().to_lowercase(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{LlmError, MockLlmClient};

    fn settings() -> PipelineSettings {
        PipelineSettings {
            chunk_size: 60,
            chunk_overlap: 0,
            max_retries: 0,
            max_concurrency: 3,
            ..PipelineSettings::default()
        }
    }

    fn requirement_json(name: &str) -> String {
        format!(
            r#"[{{"requirement": "{name}", "fields": ["Amount"], "rule": "Amount > 0", "exceptions": null}}]"#
        )
    }

    #[test]
    fn single_chunk_request_parameters() {
        let llm = MockLlmClient::new(&requirement_json("Positive amount"));
        let reqs = extract_requirements(&llm, &settings(), "Amounts must be positive.").unwrap();

        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].requirement, "Positive amount");
        assert!(reqs[0].exceptions.is_empty());

        let sent = &llm.requests()[0];
        assert_eq!(sent.temperature, 0.3);
        assert_eq!(sent.max_tokens, Some(2000));
        assert!(sent.user_prompt().unwrap().contains("Amounts must be positive."));
    }

    #[test]
    fn chunks_keep_document_order() {
        let text = "Paragraph one about capital ratios.\n\nParagraph two about liquidity.\n\nParagraph three about reporting.";
        let llm = MockLlmClient::with_responder(|req, _| {
            let prompt = req.user_prompt().unwrap_or_default();
            let name = if prompt.contains("capital") {
                "first"
            } else if prompt.contains("liquidity") {
                "second"
            } else {
                "third"
            };
            Ok(requirement_json(name))
        });
        let reqs = extract_requirements(&llm, &settings(), text).unwrap();
        let names: Vec<_> = reqs.iter().map(|r| r.requirement.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(llm.call_count(), 3);
    }

    #[test]
    fn duplicate_requirements_are_removed() {
        let text = "Section A covers capital adequacy ratios.\n\nSection B covers capital adequacy buffers.";
        let llm = MockLlmClient::new(&requirement_json("Same rule"));
        let reqs = extract_requirements(&llm, &settings(), text).unwrap();
        assert_eq!(llm.call_count(), 2);
        assert_eq!(reqs.len(), 1);
    }

    #[test]
    fn failed_chunk_is_skipped() {
        let text = "Paragraph one about capital ratios.\n\nParagraph two about liquidity.";
        let llm = MockLlmClient::with_responder(|req, _| {
            if req.user_prompt().unwrap_or_default().contains("liquidity") {
                Ok("not json at all".into())
            } else {
                Ok(requirement_json("kept"))
            }
        });
        let reqs = extract_requirements(&llm, &settings(), text).unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].requirement, "kept");
    }

    #[test]
    fn all_chunks_failing_returns_last_error() {
        let llm = MockLlmClient::failing(LlmError::Api {
            status: 401,
            body: "bad key".into(),
        });
        let err = extract_requirements(&llm, &settings(), "Some regulation text.").unwrap_err();
        assert!(matches!(err, PipelineError::Llm(LlmError::Api { status: 401, .. })));
    }

    #[test]
    fn wrapped_object_is_accepted() {
        let llm = MockLlmClient::new(
            r#"```json
{"requirements": [{"requirement": "KYC", "fields": "Customer_ID", "rule": "present"}]}
```"#,
        );
        let reqs = extract_requirements(&llm, &settings(), "Know your customer.").unwrap();
        assert_eq!(reqs[0].fields, vec!["Customer_ID"]);
    }

    #[test]
    fn empty_text_is_rejected() {
        let llm = MockLlmClient::new("[]");
        assert!(matches!(
            extract_requirements(&llm, &settings(), "   "),
            Err(PipelineError::EmptyInput)
        ));
        assert_eq!(llm.call_count(), 0);
    }
}
