//! DocChat Ingestion Library
//!
//! Turns uploaded documents into text the context core can work with:
//! 1. Extracts text from PDF bytes
//! 2. Stores the document
//! 3. Splits text into word-aligned chunks for retrieval

pub mod chunker;
pub mod errors;
pub mod pdf;
pub mod processor;

pub use chunker::{chunk_text, normalize_whitespace};
pub use errors::IngestionError;
pub use pdf::extract_pdf_text;
pub use processor::{DocumentIngestor, IngestionSummary};
