//! Repository interfaces for data access
//!
//! The conversation service only talks to these traits. [`InMemoryStore`]
//! implements all of them; durable backends can be swapped in behind the
//! same interfaces.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Conversation, Document, StoredMessage};

/// Conversation persistence
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Find a conversation by ID
    async fn get(&self, id: Uuid) -> Result<Option<Conversation>>;

    /// Persist a new conversation
    async fn create(&self, conversation: Conversation) -> Result<Conversation>;

    /// All conversations of an owner, newest first
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Conversation>>;

    /// Delete a conversation and its messages; false when it did not exist
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Add model-reported token usage and bump `updated_at`
    async fn record_usage(&self, id: Uuid, tokens: u32) -> Result<()>;
}

/// Message persistence
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append a message to its conversation
    async fn create(&self, message: StoredMessage) -> Result<StoredMessage>;

    /// Messages of a conversation in creation order
    async fn list_by_conversation(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>>;

    /// Number of messages in a conversation
    async fn count_by_conversation(&self, conversation_id: Uuid) -> Result<usize>;
}

/// Document persistence
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Persist an extracted document
    async fn create(&self, document: Document) -> Result<Document>;

    /// Find a document by ID
    async fn get(&self, id: Uuid) -> Result<Option<Document>>;
}
