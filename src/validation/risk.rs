use serde::{Serialize, Serializer};
use serde_json::Value;

use super::validator::ValidationResult;
use super::{lookup, numeric_value, ValidatorSettings};
use crate::pipeline::{value_as_text, Transaction};

const HIGH_VALUE_HIGH_RISK_COUNTRY: f64 = 0.8;
const ROUND_AMOUNT: f64 = 0.6;
const STATISTICAL_OUTLIER: f64 = 0.7;
/// Score added per violation, capped at 1.
const PER_VIOLATION: f64 = 0.2;

/// A transaction record with its risk score attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub record: Transaction,
    pub risk_score: f64,
    pub risk_reasons: String,
}

impl Serialize for RiskAssessment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut flat = self.record.clone();
        flat.insert("risk_score".into(), Value::from(self.risk_score));
        flat.insert("risk_reasons".into(), Value::String(self.risk_reasons.clone()));
        flat.serialize(serializer)
    }
}

/// Scores a validated transaction between 0 and 1.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    high_risk_countries: Vec<String>,
    high_value_threshold: f64,
}

impl RiskEngine {
    pub fn new(settings: &ValidatorSettings) -> Self {
        Self {
            high_risk_countries: settings
                .high_risk_countries
                .iter()
                .map(|c| c.trim().to_uppercase())
                .collect(),
            high_value_threshold: settings.high_value_threshold,
        }
    }

    /// Score and `"; "`-joined reasons. The score is the highest of the
    /// violation score and every risk factor that fires.
    pub fn assess(&self, record: &Transaction, result: &ValidationResult) -> (f64, String) {
        let mut score = (PER_VIOLATION * result.violations.len() as f64).min(1.0);
        let mut reasons = Vec::new();

        if !result.violations.is_empty() {
            reasons.push(format!("{} validation issues", result.violations.len()));
        }
        if result.anomaly_score > 0.0 {
            reasons.push("Anomalous patterns detected".to_string());
        }

        for (factor, reason) in self.factors(record, result) {
            score = score.max(factor);
            reasons.push(reason.to_string());
        }

        let reasons = if reasons.is_empty() {
            "Low risk".to_string()
        } else {
            reasons.join("; ")
        };
        (score, reasons)
    }

    pub fn assessment(&self, record: &Transaction, result: &ValidationResult) -> RiskAssessment {
        let (risk_score, risk_reasons) = self.assess(record, result);
        RiskAssessment {
            record: record.clone(),
            risk_score,
            risk_reasons,
        }
    }

    fn factors(&self, record: &Transaction, result: &ValidationResult) -> Vec<(f64, &'static str)> {
        let mut factors = Vec::new();
        let amount = lookup(record, "Amount").and_then(numeric_value);
        let country = lookup(record, "Country")
            .map(value_as_text)
            .map(|c| c.trim().to_uppercase());

        if let (Some(amount), Some(country)) = (amount, country.as_deref()) {
            if amount > self.high_value_threshold
                && self.high_risk_countries.iter().any(|c| c == country)
            {
                factors.push((
                    HIGH_VALUE_HIGH_RISK_COUNTRY,
                    "High-value transaction in high-risk country",
                ));
            }
        }
        if let Some(amount) = amount {
            if amount > 0.0 && amount % 1000.0 == 0.0 {
                factors.push((ROUND_AMOUNT, "Round-number transaction amount"));
            }
        }
        if result.statistical_outlier {
            factors.push((STATISTICAL_OUTLIER, "Statistical anomaly detected"));
        }
        factors
    }
}
