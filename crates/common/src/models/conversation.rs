//! Conversation record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum title length derived from the first message
const TITLE_CHARS: usize = 60;

/// How replies in a conversation are produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// Free-form chat over the bounded history
    #[default]
    OpenChat,
    /// Answers grounded in chunks retrieved from a document
    Rag,
}

impl ConversationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationMode::OpenChat => "open_chat",
            ConversationMode::Rag => "rag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub owner_id: String,
    pub title: Option<String>,
    pub mode: ConversationMode,
    /// Document attached for retrieval, if any
    pub document_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Sum of model-reported tokens across all replies
    pub total_tokens: u64,
}

impl Conversation {
    pub fn new(owner_id: impl Into<String>, mode: ConversationMode, document_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            title: None,
            mode,
            document_id,
            created_at: now,
            updated_at: now,
            total_tokens: 0,
        }
    }

    /// Use the opening words of `first_message` as the title
    pub fn with_title_from(mut self, first_message: &str) -> Self {
        let title: String = first_message
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(TITLE_CHARS)
            .collect();
        self.title = (!title.is_empty()).then_some(title);
        self
    }
}
