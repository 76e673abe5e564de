//! `POST /api/upload`: extract text from an uploaded PDF or CSV.
//!
//! The upload is staged in a temp file carrying the original extension and
//! removed when the handler returns, whatever the outcome.

use std::io::Write;
use std::path::Path;

use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{run_blocking, ApiContext};
use crate::pipeline::extraction::{DocumentFormat, ExtractedTable};

/// The `file` part of a multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Read the first `file` field; other fields are ignored.
pub async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| mime_guess::from_path(&filename).first_or_octet_stream().to_string());
        let bytes = field.bytes().await?.to_vec();
        return Ok(UploadedFile {
            filename,
            content_type,
            bytes,
        });
    }
    Err(ApiError::BadRequest("Missing multipart field \"file\"".into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub include_tables: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub text: String,
    pub file_type: String,
    pub original_filename: String,
    pub content_type: String,
    pub page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<ExtractedTable>>,
}

pub async fn upload(
    State(ctx): State<ApiContext>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let file = read_file_field(&mut multipart).await?;
    if file.bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".into()));
    }
    // Reject unknown types before anything touches disk.
    DocumentFormat::from_path(Path::new(&file.filename))?;

    tracing::info!(
        filename = %file.filename,
        bytes = file.bytes.len(),
        include_tables = query.include_tables,
        "Document uploaded"
    );

    let include_tables = query.include_tables;
    let response = run_blocking(move || {
        let suffix = Path::new(&file.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut staged = tempfile::Builder::new()
            .prefix("gdaip-upload-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| ApiError::Internal(format!("Staging file: {e}")))?;
        staged
            .write_all(&file.bytes)
            .and_then(|_| staged.flush())
            .map_err(|e| ApiError::Internal(format!("Staging file: {e}")))?;

        let doc = ctx.pipeline.extract_file(staged.path(), include_tables)?;
        Ok(UploadResponse {
            text: doc.text,
            file_type: doc.file_type,
            original_filename: file.filename,
            content_type: file.content_type,
            page_count: doc.page_count,
            tables: include_tables.then_some(doc.tables),
        })
    })
    .await?;

    Ok(Json(response))
}
