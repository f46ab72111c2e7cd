//! DocChat Search Library
//!
//! Lexical retrieval over document chunks:
//! - Keyword extraction and overlap scoring
//! - Stable top-k ranking

pub mod retrieval;

pub use retrieval::{keywords, rank, retrieve, score, ScoredChunk};
