//! Shared types for the API layer.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::error::ApiError;
use crate::config::AppConfig;
use crate::pipeline::{CompliancePipeline, ProfilingRule, RuleSet, Transaction};
use crate::validation::TransactionValidator;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: CompliancePipeline,
    pub validator: Arc<TransactionValidator>,
    pub config: Arc<AppConfig>,
}

impl ApiContext {
    pub fn new(pipeline: CompliancePipeline, config: AppConfig) -> Self {
        Self {
            pipeline,
            validator: Arc::new(TransactionValidator::new(config.validator_settings())),
            config: Arc::new(config),
        }
    }
}

/// Run blocking pipeline work off the async runtime.
pub async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {e}")))?
}

/// Rules arrive as `{"rules": [...]}` or as a bare list.
pub fn parse_rules(value: &Value) -> Result<Vec<ProfilingRule>, ApiError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => from_value(value, "rules"),
        Value::Object(map) if map.contains_key("rules") => {
            let set: RuleSet = from_value(value, "rules")?;
            Ok(set.rules)
        }
        _ => Err(ApiError::BadRequest(
            "rules must be a list or an object with a \"rules\" list".into(),
        )),
    }
}

/// Transactions arrive as one object or a list of objects.
pub fn parse_records(value: &Value) -> Result<Vec<Transaction>, ApiError> {
    match value {
        Value::Object(map) => Ok(vec![map.clone()]),
        Value::Array(_) => from_value(value, "data"),
        _ => Err(ApiError::BadRequest(
            "data must be an object or a list of objects".into(),
        )),
    }
}

fn from_value<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T, ApiError> {
    serde_json::from_value(value.clone())
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))
}
