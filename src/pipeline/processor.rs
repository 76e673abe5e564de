//! Compliance pipeline orchestrator.
//!
//! Single entry point that drives the document flow:
//! extract → requirements → profiling rules → validation code,
//! plus the summary and anomaly-detection side flows.
//!
//! The LLM is injected as a trait object so every stage runs against
//! `MockLlmClient` in tests.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::anomaly::detect_anomalies;
use super::extraction::{DocumentExtractor, ExtractOptions, ExtractedDocument};
use super::llm::LlmClient;
use super::requirements::extract_requirements;
use super::rules::{generate_profiling_rules, generate_validation_code};
use super::summarize::summarize_document;
use super::types::{Requirement, RuleSet, Transaction, Verdict};
use super::{PipelineError, PipelineSettings};

/// Result of turning regulation text into rules.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub requirements: Vec<Requirement>,
    pub rules: RuleSet,
    pub validation_code: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CompliancePipeline {
    llm: Arc<dyn LlmClient>,
    settings: PipelineSettings,
}

impl CompliancePipeline {
    pub fn new(llm: Arc<dyn LlmClient>, settings: PipelineSettings) -> Self {
        Self { llm, settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn extract_options(&self, include_tables: bool) -> ExtractOptions {
        ExtractOptions {
            include_tables,
            max_pages: self.settings.max_pdf_pages,
            max_workers: self.settings.max_concurrency,
        }
    }

    /// Extract a local PDF or CSV.
    pub fn extract_file(
        &self,
        path: &Path,
        include_tables: bool,
    ) -> Result<ExtractedDocument, PipelineError> {
        let options = self.extract_options(include_tables);
        Ok(DocumentExtractor::default().extract(path, &options)?)
    }

    pub fn requirements(&self, text: &str) -> Result<Vec<Requirement>, PipelineError> {
        extract_requirements(self.llm.as_ref(), &self.settings, text)
    }

    /// Requirements, then rules derived from them, then code for the rules.
    pub fn process_text(&self, text: &str) -> Result<ProcessOutcome, PipelineError> {
        let started = std::time::Instant::now();
        let requirements = self.requirements(text)?;
        let rules = generate_profiling_rules(self.llm.as_ref(), &self.settings, &requirements)?;
        let validation_code = generate_validation_code(self.llm.as_ref(), &self.settings, &rules)?;

        tracing::info!(
            requirements = requirements.len(),
            rules = rules.len(),
            code_chars = validation_code.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Regulation text processed"
        );

        Ok(ProcessOutcome {
            requirements,
            rules: RuleSet { rules },
            validation_code,
            processed_at: Utc::now(),
        })
    }

    /// Extract a document and process its text; tables are appended when
    /// `include_tables` is set.
    pub fn process_file(
        &self,
        path: &Path,
        include_tables: bool,
    ) -> Result<ProcessOutcome, PipelineError> {
        let doc = self.extract_file(path, include_tables)?;
        let text = if include_tables {
            doc.text_with_tables()
        } else {
            doc.text
        };
        self.process_text(&text)
    }

    pub fn summarize(&self, text: &str) -> Result<String, PipelineError> {
        summarize_document(self.llm.as_ref(), &self.settings, text)
    }

    pub fn detect(
        &self,
        rules: &Value,
        transactions: &[Transaction],
    ) -> Result<Vec<Verdict>, PipelineError> {
        detect_anomalies(self.llm.as_ref(), &self.settings, rules, transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{LlmError, MockLlmClient};
    use serde_json::json;

    fn pipeline(llm: MockLlmClient) -> (Arc<MockLlmClient>, CompliancePipeline) {
        let llm = Arc::new(llm);
        let settings = PipelineSettings {
            max_retries: 0,
            ..PipelineSettings::default()
        };
        (llm.clone(), CompliancePipeline::new(llm, settings))
    }

    /// Answers each stage by recognising its prompt.
    fn staged_model() -> MockLlmClient {
        MockLlmClient::with_responder(|req, _| {
            let prompt = req.user_prompt().unwrap_or_default();
            if prompt.contains("Extract all regulatory requirements") {
                Ok(r#"[{"requirement": "Non-negative balance", "fields": ["Account_Balance"],
                        "rule": "Account_Balance >= 0", "exceptions": []}]"#
                    .into())
            } else if prompt.contains("data profiling rules") {
                Ok(r#"{"rules": [{"description": "Balance must be non-negative",
                        "fields": ["Account_Balance"], "validation_logic": "value >= 0",
                        "parameters": {"min": 0}}]}"#
                    .into())
            } else if prompt.contains("validate_transaction") {
                Ok("def validate_transaction(tx):\n    return tx['Account_Balance'] >= 0".into())
            } else {
                Err(LlmError::MalformedResponse("unexpected prompt".into()))
            }
        })
    }

    #[test]
    fn process_text_runs_all_stages() {
        let (llm, pipeline) = pipeline(staged_model());
        let outcome = pipeline
            .process_text("Account balances may never be negative.")
            .unwrap();

        assert_eq!(outcome.requirements.len(), 1);
        assert_eq!(outcome.rules.rules.len(), 1);
        assert!(outcome.validation_code.starts_with("def validate_transaction"));
        assert_eq!(llm.call_count(), 3);

        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json["rules"]["rules"].is_array());
        assert!(json["processed_at"].is_string());
    }

    #[test]
    fn no_rules_skips_code_generation() {
        let (llm, pipeline) = pipeline(MockLlmClient::with_responder(|req, _| {
            if req.user_prompt().unwrap_or_default().contains("Extract all regulatory") {
                Ok(r#"[{"requirement": "r", "fields": [], "rule": "x"}]"#.into())
            } else {
                Ok("unparseable".into())
            }
        }));
        let outcome = pipeline.process_text("Some text.").unwrap();
        assert!(outcome.rules.rules.is_empty());
        assert!(outcome.validation_code.is_empty());
        assert_eq!(llm.call_count(), 2);
    }

    #[test]
    fn process_file_reads_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.csv");
        std::fs::write(&path, "Account_Balance,Currency\n100,USD\n").unwrap();

        let (llm, pipeline) = pipeline(staged_model());
        pipeline.process_file(&path, false).unwrap();
        let first = llm.requests()[0].user_prompt().unwrap().to_string();
        assert!(first.contains("CSV Data Summary:"));
    }

    #[test]
    fn extraction_error_is_wrapped() {
        let (_, pipeline) = pipeline(staged_model());
        let err = pipeline
            .process_file(Path::new("/missing/doc.pdf"), false)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
    }

    #[test]
    fn detect_delegates_to_anomaly_stage() {
        let (_, pipeline) = pipeline(MockLlmClient::new(
            r#"[{"transaction_id": "T1", "status": "NORMAL"}]"#,
        ));
        let mut tx = Transaction::new();
        tx.insert("transaction_id".into(), json!("T1"));
        let verdicts = pipeline.detect(&json!({"rules": []}), &[tx]).unwrap();
        assert_eq!(verdicts.len(), 1);
        assert!(!verdicts[0].is_anomaly());
    }
}
