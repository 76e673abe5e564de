use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::ApiError;
use crate::api::types::{parse_records, run_blocking, ApiContext};
use crate::pipeline::Verdict;
use crate::validation::ensure_transaction_ids;

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    pub rules: Value,
    pub transactions: Value,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub results: Vec<Verdict>,
}

/// `POST /api/detect`: model verdicts only, one per transaction.
pub async fn detect(
    State(ctx): State<ApiContext>,
    Json(payload): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    let mut transactions = parse_records(&payload.transactions)?;
    if transactions.is_empty() {
        return Err(ApiError::BadRequest("transactions must not be empty".into()));
    }
    ensure_transaction_ids(&mut transactions);

    let rules = payload.rules;
    let results = run_blocking(move || Ok(ctx.pipeline.detect(&rules, &transactions)?)).await?;
    Ok(Json(DetectResponse { results }))
}
