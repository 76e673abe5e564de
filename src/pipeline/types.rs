use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A transaction record exactly as received: a free-form JSON object.
pub type Transaction = Map<String, Value>;

/// One regulatory requirement lifted from document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub requirement: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub fields: Vec<String>,
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub rule: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub exceptions: Vec<String>,
}

/// A data-profiling rule generated from requirements.
///
/// `validation_logic` is model-written pseudo-code. It is kept for display and
/// for check inference, never executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilingRule {
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub description: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_logic: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Wire shape `{ "rules": [...] }` returned by `/api/process`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<ProfilingRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Anomaly,
    Normal,
    Error,
}

impl<'de> Deserialize<'de> for VerdictStatus {
    /// Models vary the case (`"anomaly"`, `"Normal"`); match it loosely.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_uppercase().as_str() {
            "ANOMALY" => Ok(Self::Anomaly),
            "NORMAL" => Ok(Self::Normal),
            "ERROR" => Ok(Self::Error),
            _ => Err(serde::de::Error::unknown_variant(
                &raw,
                &["ANOMALY", "NORMAL", "ERROR"],
            )),
        }
    }
}

/// The model's judgement on one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(deserialize_with = "string_or_scalar")]
    pub transaction_id: String,
    pub status: VerdictStatus,
    #[serde(default, alias = "reason", deserialize_with = "string_or_list")]
    pub reasons: Vec<String>,
}

impl Verdict {
    pub fn error(transaction_id: &str, reason: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            status: VerdictStatus::Error,
            reasons: vec![reason.into()],
        }
    }

    pub fn is_anomaly(&self) -> bool {
        self.status == VerdictStatus::Anomaly
    }
}

/// Render a JSON scalar as text; `null` becomes empty.
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Accept `"a"`, `["a", "b"]`, `null` or scalars; always yield a list.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => vec![],
        Value::Array(items) => items
            .iter()
            .map(value_as_text)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Value::String(s) if s.trim().is_empty() => vec![],
        other => vec![value_as_text(&other)],
    })
}

/// Accept a string or any scalar (models often emit numeric ids).
fn string_or_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(_) | Value::Object(_) => Err(serde::de::Error::custom(
            "expected a string or scalar value",
        )),
        other => Ok(value_as_text(&other)),
    }
}
