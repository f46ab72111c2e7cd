//! Ingestion error types

use docchat_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {filename}: {message}")]
    PdfParse { filename: String, message: String },

    #[error("No text could be extracted from {filename}")]
    EmptyText { filename: String },

    #[error("Only PDF files are supported, got {filename}")]
    UnsupportedFormat { filename: String },

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::PdfParse { .. } | IngestionError::UnsupportedFormat { .. } => {
                AppError::InvalidFormat {
                    message: e.to_string(),
                }
            }
            IngestionError::EmptyText { filename } => AppError::EmptyDocument { filename },
            IngestionError::TooLarge { size, limit } => AppError::PayloadTooLarge { size, limit },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_client_errors() {
        let cases: Vec<(IngestionError, u16)> = vec![
            (
                IngestionError::PdfParse {
                    filename: "a.pdf".into(),
                    message: "bad xref".into(),
                },
                400,
            ),
            (
                IngestionError::EmptyText {
                    filename: "scan.pdf".into(),
                },
                400,
            ),
            (
                IngestionError::UnsupportedFormat {
                    filename: "notes.txt".into(),
                },
                400,
            ),
            (
                IngestionError::TooLarge { size: 20, limit: 10 },
                413,
            ),
        ];

        for (err, status) in cases {
            let app: AppError = err.into();
            assert_eq!(app.status_code().as_u16(), status);
            assert!(app.is_client_error());
        }
    }

    #[test]
    fn test_empty_text_keeps_filename() {
        let app: AppError = IngestionError::EmptyText {
            filename: "scan.pdf".into(),
        }
        .into();
        assert!(matches!(app, AppError::EmptyDocument { filename } if filename == "scan.pdf"));
    }
}
