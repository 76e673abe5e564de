//! Batch validation: rule checks per record, an outlier pass across the batch,
//! then risk scoring and remediation for every record.

use serde::Serialize;

use super::checks::apply_rule;
use super::isolation_forest::{numeric_matrix, IsolationForest, OutlierDetector};
use super::remediation::{remediate, RemediationAction};
use super::risk::{RiskAssessment, RiskEngine};
use super::{ValidationError, ValidatorSettings};
use crate::pipeline::anomaly::record_id;
use crate::pipeline::{ProfilingRule, Transaction, Verdict};

pub const STATISTICAL_ANOMALY: &str = "Statistical anomaly detected";

const SCORE_VIOLATION: f64 = 1.0;
const SCORE_STATISTICAL_ONLY: f64 = 0.5;
const SCORE_CLEAN: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub transaction_id: String,
    pub fields_checked: Vec<String>,
    pub violations: Vec<String>,
    pub anomaly_score: f64,
    pub statistical_outlier: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_verdict: Option<Verdict>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub validation_results: Vec<ValidationResult>,
    pub risk_assessment: Vec<RiskAssessment>,
    pub remediation_actions: Vec<RemediationAction>,
}

#[derive(Debug, Clone)]
pub struct TransactionValidator {
    settings: ValidatorSettings,
    risk: RiskEngine,
}

impl Default for TransactionValidator {
    fn default() -> Self {
        Self::new(ValidatorSettings::default())
    }
}

impl TransactionValidator {
    pub fn new(settings: ValidatorSettings) -> Self {
        let risk = RiskEngine::new(&settings);
        Self { settings, risk }
    }

    /// Validate `records` against `rules`. Model verdicts, when given, are
    /// matched by transaction id and an ANOMALY verdict counts as a violation.
    pub fn validate(
        &self,
        records: &[Transaction],
        rules: &[ProfilingRule],
        verdicts: Option<&[Verdict]>,
    ) -> Result<ValidationReport, ValidationError> {
        if records.is_empty() {
            return Err(ValidationError::EmptyInput);
        }

        let fields_checked = fields_checked(rules);
        let outliers = self.statistical_outliers(records);

        let validation_results: Vec<ValidationResult> = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let transaction_id = record_id(record, i);
                let llm_verdict = verdicts.and_then(|vs| {
                    vs.iter()
                        .find(|v| v.transaction_id == transaction_id)
                        .cloned()
                });

                let mut violations: Vec<String> = rules
                    .iter()
                    .flat_map(|rule| apply_rule(record, rule))
                    .collect();
                if let Some(verdict) = llm_verdict.as_ref().filter(|v| v.is_anomaly()) {
                    violations.push(model_flag(verdict));
                }

                let statistical_outlier = outliers[i];
                let anomaly_score = if !violations.is_empty() {
                    SCORE_VIOLATION
                } else if statistical_outlier {
                    violations.push(STATISTICAL_ANOMALY.to_string());
                    SCORE_STATISTICAL_ONLY
                } else {
                    SCORE_CLEAN
                };

                ValidationResult {
                    transaction_id,
                    fields_checked: fields_checked.clone(),
                    violations,
                    anomaly_score,
                    statistical_outlier,
                    llm_verdict,
                }
            })
            .collect();

        let risk_assessment = records
            .iter()
            .zip(&validation_results)
            .map(|(record, result)| self.risk.assessment(record, result))
            .collect();
        let remediation_actions = validation_results.iter().map(remediate).collect();

        let flagged = validation_results
            .iter()
            .filter(|r| !r.violations.is_empty())
            .count();
        tracing::info!(
            records = records.len(),
            rules = rules.len(),
            flagged,
            "Validation complete"
        );

        Ok(ValidationReport {
            validation_results,
            risk_assessment,
            remediation_actions,
        })
    }

    /// Isolation-forest flags over the batch's numeric columns. Batches the
    /// forest cannot learn from yield no flags.
    fn statistical_outliers(&self, records: &[Transaction]) -> Vec<bool> {
        let none = vec![false; records.len()];
        let matrix = numeric_matrix(records);
        if matrix.rows.len() < 2 || matrix.columns.is_empty() {
            tracing::debug!(
                rows = matrix.rows.len(),
                columns = matrix.columns.len(),
                "Skipping outlier pass"
            );
            return none;
        }

        let mut forest = IsolationForest::new(
            self.settings.n_trees,
            self.settings.sample_size,
            self.settings.contamination,
            self.settings.seed,
        );
        let flags = match forest.fit(&matrix.rows) {
            Ok(()) => {
                tracing::debug!(
                    columns = ?matrix.columns,
                    threshold = ?forest.threshold(),
                    "Outlier forest fitted"
                );
                forest.detect(&matrix.rows)
            }
            Err(e) => Err(e),
        };
        match flags {
            Ok(flags) => flags,
            Err(e) => {
                tracing::warn!(error = %e, "Outlier pass failed");
                none
            }
        }
    }
}

fn model_flag(verdict: &Verdict) -> String {
    if verdict.reasons.is_empty() {
        "Model-flagged anomaly".to_string()
    } else {
        format!("Model-flagged anomaly: {}", verdict.reasons.join("; "))
    }
}

/// Every field named by the rules, first occurrence first.
fn fields_checked(rules: &[ProfilingRule]) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for field in rules.iter().flat_map(|r| &r.fields) {
        if !fields.contains(field) {
            fields.push(field.clone());
        }
    }
    fields
}
