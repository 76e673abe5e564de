use super::llm::{chat_with_retry, ChatRequest, LlmClient};
use super::prompt::{build_rules_prompt, build_validation_code_prompt};
use super::repair::{clean_code_output, parse_items_lenient, parse_llm_json, value_to_list};
use super::types::{ProfilingRule, Requirement};
use super::{truncate_chars, PipelineError, PipelineSettings};

const RULES_MAX_TOKENS: u32 = 3000;
const RULES_TEMPERATURE: f32 = 0.3;
const CODE_MAX_TOKENS: u32 = 3000;
const CODE_TEMPERATURE: f32 = 0.1;

/// Turn requirements into data-profiling rules.
///
/// Output that cannot be parsed yields an empty list; transport errors
/// propagate.
pub fn generate_profiling_rules(
    llm: &dyn LlmClient,
    settings: &PipelineSettings,
    requirements: &[Requirement],
) -> Result<Vec<ProfilingRule>, PipelineError> {
    if requirements.is_empty() {
        tracing::info!("No requirements, skipping rule generation");
        return Ok(vec![]);
    }

    let request = ChatRequest::user(&settings.model, build_rules_prompt(requirements))
        .temperature(RULES_TEMPERATURE)
        .max_tokens(RULES_MAX_TOKENS);
    let response = chat_with_retry(llm, &request, settings.max_retries)?;

    match parse_llm_json(&response) {
        Ok(value) => {
            let rules: Vec<ProfilingRule> = parse_items_lenient(value_to_list(value, "rules"));
            tracing::info!(count = rules.len(), "Profiling rules generated");
            Ok(rules)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                response = truncate_chars(&response, 500),
                "Could not parse profiling rules"
            );
            Ok(vec![])
        }
    }
}

/// Ask for a `validate_transaction` function implementing `rules`.
///
/// The code is returned for display only.
pub fn generate_validation_code(
    llm: &dyn LlmClient,
    settings: &PipelineSettings,
    rules: &[ProfilingRule],
) -> Result<String, PipelineError> {
    if rules.is_empty() {
        return Ok(String::new());
    }

    let request = ChatRequest::user(&settings.model, build_validation_code_prompt(rules))
        .temperature(CODE_TEMPERATURE)
        .max_tokens(CODE_MAX_TOKENS);
    let response = chat_with_retry(llm, &request, settings.max_retries)?;
    Ok(clean_code_output(&response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{LlmError, MockLlmClient};

    fn settings() -> PipelineSettings {
        PipelineSettings {
            max_retries: 0,
            ..PipelineSettings::default()
        }
    }

    fn requirement() -> Requirement {
        Requirement {
            requirement: "Balances must not be negative".into(),
            fields: vec!["Account_Balance".into()],
            rule: "Account_Balance >= 0".into(),
            exceptions: vec![],
        }
    }

    #[test]
    fn parses_rules_object() {
        let llm = MockLlmClient::new(
            r#"Here are the rules:
```json
{"rules": [{"description": "Non-negative balance", "fields": ["Account_Balance"],
  "validation_logic": "value >= 0", "parameters": {"min": 0}},]}
```"#,
        );
        let rules = generate_profiling_rules(&llm, &settings(), &[requirement()]).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].fields, vec!["Account_Balance"]);
        assert_eq!(rules[0].parameters["min"], 0);

        let sent = &llm.requests()[0];
        assert_eq!(sent.max_tokens, Some(3000));
        assert_eq!(sent.temperature, 0.3);
    }

    #[test]
    fn unparseable_rules_yield_empty_list() {
        let llm = MockLlmClient::new("I cannot help with that.");
        let rules = generate_profiling_rules(&llm, &settings(), &[requirement()]).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn transport_error_propagates() {
        let llm = MockLlmClient::failing(LlmError::Timeout(120));
        let err = generate_profiling_rules(&llm, &settings(), &[requirement()]).unwrap_err();
        assert!(matches!(err, PipelineError::Llm(LlmError::Timeout(120))));
    }

    #[test]
    fn no_requirements_means_no_call() {
        let llm = MockLlmClient::new("[]");
        assert!(generate_profiling_rules(&llm, &settings(), &[]).unwrap().is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn validation_code_is_cleaned() {
        let llm = MockLlmClient::new(
            "```python\n# validator\ndef validate_transaction(tx):\n    return tx['Amount'] >= 0\n```",
        );
        let rule = ProfilingRule {
            description: "Non-negative amount".into(),
            fields: vec!["Amount".into()],
            validation_logic: None,
            parameters: Default::default(),
        };
        let code = generate_validation_code(&llm, &settings(), &[rule]).unwrap();
        assert_eq!(
            code,
            "def validate_transaction(tx):\n    return tx['Amount'] >= 0"
        );
        assert_eq!(llm.requests()[0].temperature, 0.1);
    }
}
