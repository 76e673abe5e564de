//! `POST /api/process`: regulation text (or a stored document) to rules.

use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{run_blocking, ApiContext};
use crate::pipeline::ProcessOutcome;

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub text: Option<String>,
    /// Path of a document under the configured documents directory.
    pub file_path: Option<String>,
    #[serde(default)]
    pub include_tables: bool,
}

pub async fn process(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ProcessRequest>,
) -> Result<Json<ProcessOutcome>, ApiError> {
    let text = payload.text.filter(|t| !t.trim().is_empty());
    let file_path = payload.file_path.filter(|p| !p.trim().is_empty());

    let outcome = match (text, file_path) {
        (Some(text), _) => {
            tracing::info!(chars = text.len(), "Processing submitted text");
            run_blocking(move || Ok(ctx.pipeline.process_text(&text)?)).await?
        }
        (None, Some(file_path)) => {
            let path = resolve_document(&ctx.config.documents_dir, &file_path)?;
            tracing::info!(path = %path.display(), "Processing stored document");
            let include_tables = payload.include_tables;
            run_blocking(move || Ok(ctx.pipeline.process_file(&path, include_tables)?)).await?
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either text or file_path must be provided".into(),
            ))
        }
    };

    Ok(Json(outcome))
}

/// Resolve `requested` and require it to sit inside `documents_dir`.
fn resolve_document(documents_dir: &Path, requested: &str) -> Result<PathBuf, ApiError> {
    let requested = Path::new(requested);
    let candidate = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        documents_dir.join(requested)
    };

    let resolved = candidate
        .canonicalize()
        .map_err(|_| ApiError::NotFound(format!("File not found: {}", requested.display())))?;
    let root = documents_dir
        .canonicalize()
        .map_err(|_| ApiError::NotFound("Documents directory does not exist".into()))?;

    if !resolved.starts_with(&root) {
        tracing::warn!(path = %resolved.display(), "Rejected path outside documents directory");
        return Err(ApiError::BadRequest(
            "file_path must be inside the documents directory".into(),
        ));
    }
    Ok(resolved)
}
