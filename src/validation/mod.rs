//! Local transaction validation: rule checks, an isolation-forest outlier
//! pass, risk scoring and remediation suggestions.

pub mod checks;
pub mod isolation_forest;
pub mod remediation;
pub mod risk;
pub mod transaction;
pub mod validator;

pub use checks::*;
pub use isolation_forest::*;
pub use remediation::*;
pub use risk::*;
pub use transaction::*;
pub use validator::*;

use serde_json::Value;
use thiserror::Error;

use crate::pipeline::Transaction;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("No records to validate")]
    EmptyInput,

    #[error("Row has {found} features, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Detector has not been fitted")]
    NotFitted,
}

#[derive(Debug, Clone)]
pub struct ValidatorSettings {
    /// Expected share of outliers; sets the isolation-forest threshold.
    pub contamination: f64,
    pub n_trees: usize,
    pub sample_size: usize,
    pub seed: u64,
    pub high_risk_countries: Vec<String>,
    pub high_value_threshold: f64,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            n_trees: 100,
            sample_size: 256,
            seed: 42,
            high_risk_countries: vec!["DE".into(), "US".into(), "UK".into()],
            high_value_threshold: 5000.0,
        }
    }
}

/// A JSON number, or a string holding one (CSV uploads keep cells as text).
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Field lookup by exact name, falling back to a case-insensitive match.
pub fn lookup<'a>(record: &'a Transaction, field: &str) -> Option<&'a Value> {
    record.get(field).or_else(|| {
        record
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_values() {
        assert_eq!(numeric_value(&json!(12)), Some(12.0));
        assert_eq!(numeric_value(&json!(" -3.5 ")), Some(-3.5));
        assert_eq!(numeric_value(&json!("12a")), None);
        assert_eq!(numeric_value(&json!("NaN")), None);
        assert_eq!(numeric_value(&json!(true)), None);
        assert_eq!(numeric_value(&Value::Null), None);
    }

    #[test]
    fn lookup_ignores_case() {
        let mut record = Transaction::new();
        record.insert("Amount".into(), json!(5));
        assert_eq!(lookup(&record, "Amount"), Some(&json!(5)));
        assert_eq!(lookup(&record, "amount"), Some(&json!(5)));
        assert_eq!(lookup(&record, "Country"), None);
    }
}
