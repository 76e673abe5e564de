use std::path::Path;

use axum::extract::Multipart;
use axum::Json;
use serde::Serialize;

use super::upload::read_file_field;
use crate::api::error::ApiError;
use crate::api::types::run_blocking;
use crate::pipeline::extraction::read_transactions_csv;
use crate::pipeline::Transaction;

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub filename: String,
    pub data: Vec<Transaction>,
}

/// `POST /api/upload-transactions`: CSV rows as records, cells kept as text.
pub async fn upload_transactions(
    mut multipart: Multipart,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let file = read_file_field(&mut multipart).await?;
    let is_csv = Path::new(&file.filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(ApiError::BadRequest("Only CSV files are supported".into()));
    }

    let filename = file.filename;
    let bytes = file.bytes;
    let data = run_blocking(move || Ok(read_transactions_csv(&bytes)?)).await?;
    tracing::info!(%filename, records = data.len(), "Transactions uploaded");

    Ok(Json(TransactionsResponse { filename, data }))
}
