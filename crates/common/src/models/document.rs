//! Uploaded document record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    /// Extracted text, kept as extracted (normalization happens at chunking time)
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Length of the extracted text in characters
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}
