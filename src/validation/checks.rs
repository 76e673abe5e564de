//! Built-in field checks inferred from profiling rules.
//!
//! `validation_logic` is model-written text; it is only scanned for known
//! phrases, never evaluated.

use chrono::NaiveDate;
use serde_json::Value;

use super::{lookup, numeric_value};
use crate::pipeline::{value_as_text, ProfilingRule, Transaction};

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    /// Strings must be non-blank, numbers finite; other types pass.
    TypeDefault,
    NotEmpty,
    Numeric,
    NonNegative,
    Min(f64),
    Max(f64),
    MaxLength(usize),
    AllowedValues(Vec<String>),
    /// `YYYYMM` with a month of 01-12.
    YearMonth,
    /// `YYYY-MM-DD`, a real calendar date.
    IsoDate,
}

impl Check {
    /// `Err` carries the reason, phrased to follow "Invalid <field>: ".
    pub fn evaluate(&self, value: &Value) -> Result<(), String> {
        match self {
            Check::TypeDefault => match value {
                Value::String(s) if s.trim().is_empty() => {
                    Err("must be non-empty string".into())
                }
                Value::Number(n) if n.as_f64().map_or(true, |f| !f.is_finite()) => {
                    Err("must be valid number".into())
                }
                _ => Ok(()),
            },
            Check::NotEmpty => {
                if value_as_text(value).trim().is_empty() {
                    Err("must not be empty".into())
                } else {
                    Ok(())
                }
            }
            Check::Numeric => numeric(value).map(|_| ()),
            Check::NonNegative => {
                if numeric(value)? < 0.0 {
                    Err("must be non-negative".into())
                } else {
                    Ok(())
                }
            }
            Check::Min(min) => {
                if numeric(value)? < *min {
                    Err(format!("must be at least {min}"))
                } else {
                    Ok(())
                }
            }
            Check::Max(max) => {
                if numeric(value)? > *max {
                    Err(format!("must be at most {max}"))
                } else {
                    Ok(())
                }
            }
            Check::MaxLength(len) => {
                if value_as_text(value).chars().count() > *len {
                    Err(format!("must be at most {len} characters"))
                } else {
                    Ok(())
                }
            }
            Check::AllowedValues(allowed) => {
                let text = value_as_text(value);
                if allowed.iter().any(|a| a == text.trim()) {
                    Ok(())
                } else {
                    Err(format!("must be one of {}", allowed.join(", ")))
                }
            }
            Check::YearMonth => {
                let text = value_as_text(value);
                let text = text.trim();
                let valid = text.len() == 6
                    && text.chars().all(|c| c.is_ascii_digit())
                    && text[4..6]
                        .parse::<u32>()
                        .is_ok_and(|m| (1..=12).contains(&m));
                if valid {
                    Ok(())
                } else {
                    Err("must be a YYYYMM date".into())
                }
            }
            Check::IsoDate => {
                let text = value_as_text(value);
                if NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").is_ok() {
                    Ok(())
                } else {
                    Err("must be a YYYY-MM-DD date".into())
                }
            }
        }
    }
}

fn numeric(value: &Value) -> Result<f64, String> {
    numeric_value(value).ok_or_else(|| "must be numeric".to_string())
}

/// Map a rule to built-in checks: explicit parameters first, then phrases in
/// the logic/description. With nothing recognised, the type defaults apply.
pub fn derive_checks(rule: &ProfilingRule) -> Vec<Check> {
    let mut checks = Vec::new();
    let params = &rule.parameters;

    if let Some(allowed) = params.get("allowed_values").and_then(allowed_list) {
        checks.push(Check::AllowedValues(allowed));
    }
    if let Some(min) = first_number(params, &["min", "min_value", "minimum"]) {
        checks.push(Check::Min(min));
    }
    if let Some(max) = first_number(params, &["max", "max_value", "maximum"]) {
        checks.push(Check::Max(max));
    }
    if let Some(len) = first_number(params, &["max_length", "maxlength"]) {
        if len >= 0.0 {
            checks.push(Check::MaxLength(len as usize));
        }
    }

    let text = format!(
        "{} {}",
        rule.validation_logic.as_deref().unwrap_or_default(),
        rule.description
    )
    .to_lowercase();

    if text.contains("yyyymm") {
        checks.push(Check::YearMonth);
    }
    if text.contains("yyyy-mm-dd") {
        checks.push(Check::IsoDate);
    }
    if ["non-negative", "nonnegative", "non negative", ">= 0", ">=0", "not be negative", "cannot be negative"]
        .iter()
        .any(|p| text.contains(p))
    {
        checks.push(Check::NonNegative);
    } else if text.contains("numeric") {
        checks.push(Check::Numeric);
    }
    if ["not empty", "non-empty", "not null", "is not none", "must be provided"]
        .iter()
        .any(|p| text.contains(p))
    {
        checks.push(Check::NotEmpty);
    }

    if checks.is_empty() {
        checks.push(Check::TypeDefault);
    }
    checks
}

fn allowed_list(value: &Value) -> Option<Vec<String>> {
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().map(value_as_text).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => return None,
    };
    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!items.is_empty()).then_some(items)
}

fn first_number(params: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| params.get(*k).and_then(numeric_value))
}

/// Check `record` against one rule. A field that is absent or `null` is
/// reported as missing and not checked further.
pub fn apply_rule(record: &Transaction, rule: &ProfilingRule) -> Vec<String> {
    let checks = derive_checks(rule);
    let mut errors = Vec::new();

    for field in &rule.fields {
        let value = match lookup(record, field) {
            Some(v) if !v.is_null() => v,
            _ => {
                errors.push(format!("Missing required field: {field}"));
                continue;
            }
        };
        for check in &checks {
            if let Err(reason) = check.evaluate(value) {
                errors.push(format!("Invalid {field}: {reason}"));
            }
        }
    }
    errors
}
