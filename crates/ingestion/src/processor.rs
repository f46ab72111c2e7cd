//! Ingestion processor
//!
//! Core logic for taking in documents: format checks, PDF extraction,
//! storage and chunk accounting.

use crate::chunker::{chunk_text, normalize_whitespace};
use crate::errors::IngestionError;
use crate::pdf::extract_pdf_text;
use docchat_common::errors::{AppError, Result};
use docchat_common::metrics;
use docchat_common::models::Document;
use docchat_common::repository::DocumentRepository;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

/// Characters of normalized text returned as a preview
const PREVIEW_CHARS: usize = 200;

/// What an ingestion produced
#[derive(Debug, Clone, Serialize)]
pub struct IngestionSummary {
    pub document_id: Uuid,
    pub filename: String,
    pub char_count: usize,
    /// Chunks the document yields under the configured chunk size
    pub chunk_count: usize,
    pub preview: String,
}

/// Document ingestor
pub struct DocumentIngestor {
    documents: Arc<dyn DocumentRepository>,
    chunk_size: usize,
    max_bytes: usize,
}

impl DocumentIngestor {
    pub fn new(documents: Arc<dyn DocumentRepository>, chunk_size: usize, max_bytes: usize) -> Self {
        Self {
            documents,
            chunk_size,
            max_bytes,
        }
    }

    /// Extract, store and summarize an uploaded PDF
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn ingest_pdf(&self, filename: &str, bytes: Vec<u8>) -> Result<IngestionSummary> {
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(IngestionError::UnsupportedFormat {
                filename: filename.to_string(),
            }
            .into());
        }
        if bytes.len() > self.max_bytes {
            return Err(IngestionError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            }
            .into());
        }

        let start = Instant::now();
        info!("Extracting text from PDF...");

        // lopdf parsing is CPU-bound
        let name = filename.to_string();
        let text = tokio::task::spawn_blocking(move || extract_pdf_text(&name, &bytes))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("PDF extraction task failed: {}", e),
            })??;

        self.store(filename, text, "pdf", start).await
    }

    /// Store raw text as a document
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn ingest_text(&self, filename: &str, text: &str) -> Result<IngestionSummary> {
        if text.trim().is_empty() {
            return Err(IngestionError::EmptyText {
                filename: filename.to_string(),
            }
            .into());
        }
        if text.len() > self.max_bytes {
            return Err(IngestionError::TooLarge {
                size: text.len(),
                limit: self.max_bytes,
            }
            .into());
        }

        self.store(filename, text.to_string(), "text", Instant::now()).await
    }

    async fn store(
        &self,
        filename: &str,
        text: String,
        format: &str,
        start: Instant,
    ) -> Result<IngestionSummary> {
        let chunk_count = chunk_text(&text, self.chunk_size).len();
        let preview: String = normalize_whitespace(&text).chars().take(PREVIEW_CHARS).collect();

        let document = self.documents.create(Document::new(filename, text)).await?;
        let char_count = document.char_count();

        metrics::record_ingestion(start.elapsed().as_secs_f64(), char_count, format);
        info!(
            document_id = %document.id,
            char_count = char_count,
            chunk_count = chunk_count,
            "Document ingested"
        );

        Ok(IngestionSummary {
            document_id: document.id,
            filename: document.filename,
            char_count,
            chunk_count,
            preview,
        })
    }
}
