//! PDF text extraction module
//!
//! Extracts text content from in-memory PDF uploads using lopdf.

use crate::errors::IngestionError;
use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// A word broken across a line end: `exam-\nple`
static HYPHENATED_BREAK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\w)-\n[ \t]*(\w)").ok());

/// Extract text content from PDF bytes.
///
/// Pages are extracted one by one and joined with newlines; pages that
/// fail to decode are skipped.
pub fn extract_pdf_text(filename: &str, bytes: &[u8]) -> Result<String, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| IngestionError::PdfParse {
        filename: filename.to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    let cleaned = clean_text(&text);
    if cleaned.trim().is_empty() {
        return Err(IngestionError::EmptyText {
            filename: filename.to_string(),
        });
    }

    debug!(
        original_len = text.len(),
        cleaned_len = cleaned.len(),
        "Text extraction complete"
    );

    Ok(cleaned)
}

/// Clean extracted text
///
/// Line structure is kept; the chunker normalizes whitespace later.
pub fn clean_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '\u{FEFF}' | '\0'))
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            '\r' => '\n',
            other => other,
        })
        .collect();

    let joined = match HYPHENATED_BREAK.as_ref() {
        Some(re) => re.replace_all(&stripped, "$1$2").into_owned(),
        None => stripped,
    };

    joined.trim().to_string()
}
