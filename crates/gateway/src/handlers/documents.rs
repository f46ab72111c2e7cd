//! Document upload handlers

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use docchat_common::errors::{AppError, Result};
use docchat_ingestion::IngestionSummary;

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub filename: String,
    pub char_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Upload a PDF (or plain .txt file) and store its text
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestionSummary>> {
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Validation {
        message: format!("Multipart error: {}", e),
        field: None,
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("unnamed").to_string();
        let bytes = field.bytes().await.map_err(|e| AppError::Validation {
            message: format!("Failed to read file: {}", e),
            field: Some(FILE_FIELD.to_string()),
        })?;

        let summary = if filename.to_lowercase().ends_with(".txt") {
            let text = std::str::from_utf8(&bytes).map_err(|e| AppError::InvalidFormat {
                message: format!("{} is not valid UTF-8: {}", filename, e),
            })?;
            state.ingestor.ingest_text(&filename, text).await?
        } else {
            state.ingestor.ingest_pdf(&filename, bytes.to_vec()).await?
        };
        return Ok(Json(summary));
    }

    Err(AppError::Validation {
        message: "No file provided".to_string(),
        field: Some(FILE_FIELD.to_string()),
    })
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentResponse>> {
    let document = state
        .documents
        .get(document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    Ok(Json(DocumentResponse {
        id: document.id,
        char_count: document.char_count(),
        filename: document.filename,
        created_at: document.created_at,
    }))
}
