//! `POST /api/validate`: rule checks, outlier pass, risk and remediation.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::error::ApiError;
use crate::api::types::{parse_records, parse_rules, run_blocking, ApiContext};
use crate::validation::{ensure_transaction_ids, ValidationReport};

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub rules: Value,
    pub data: Value,
    /// Ask the model for per-transaction verdicts as well.
    #[serde(default = "default_llm_review")]
    pub llm_review: bool,
}

fn default_llm_review() -> bool {
    true
}

pub async fn validate(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ValidateRequest>,
) -> Result<Json<ValidationReport>, ApiError> {
    let rules = parse_rules(&payload.rules)?;
    let mut records = parse_records(&payload.data)?;
    if records.is_empty() {
        return Err(ApiError::BadRequest("data must contain at least one record".into()));
    }
    ensure_transaction_ids(&mut records);

    let llm_review = payload.llm_review;
    let rules_json = payload.rules;
    let report = run_blocking(move || {
        let verdicts = if llm_review {
            match ctx.pipeline.detect(&rules_json, &records) {
                Ok(verdicts) => Some(verdicts),
                Err(e) => {
                    tracing::warn!(error = %e, "Model review failed, continuing without it");
                    None
                }
            }
        } else {
            None
        };
        Ok(ctx
            .validator
            .validate(&records, &rules, verdicts.as_deref())?)
    })
    .await?;

    Ok(Json(report))
}
