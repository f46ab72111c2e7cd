//! In-memory store
//!
//! Process-local maps behind `tokio::sync::RwLock`. Nothing survives a
//! restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConversationRepository, DocumentRepository, MessageRepository};
use crate::errors::{AppError, Result};
use crate::models::{Conversation, Document, StoredMessage};

#[derive(Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<Uuid, Conversation>>,
    messages: RwLock<HashMap<Uuid, Vec<StoredMessage>>>,
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.conversations.read().await.get(&id).cloned())
    }

    async fn create(&self, conversation: Conversation) -> Result<Conversation> {
        self.conversations
            .write()
            .await
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Conversation>> {
        let mut owned: Vec<Conversation> = self
            .conversations
            .read()
            .await
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        // Lock order is conversations then messages, same as message create
        let mut conversations = self.conversations.write().await;
        let removed = conversations.remove(&id).is_some();
        if removed {
            self.messages.write().await.remove(&id);
        }
        Ok(removed)
    }

    async fn record_usage(&self, id: Uuid, tokens: u32) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(&id)
            .ok_or_else(|| AppError::ConversationNotFound { id: id.to_string() })?;
        conversation.total_tokens += u64::from(tokens);
        conversation.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(&self, message: StoredMessage) -> Result<StoredMessage> {
        // Held until the push lands so a concurrent delete cannot orphan it
        let conversations = self.conversations.read().await;
        if !conversations.contains_key(&message.conversation_id) {
            return Err(AppError::ConversationNotFound {
                id: message.conversation_id.to_string(),
            });
        }
        self.messages
            .write()
            .await
            .entry(message.conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_by_conversation(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>> {
        Ok(self
            .messages
            .read()
            .await
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_by_conversation(&self, conversation_id: Uuid) -> Result<usize> {
        Ok(self
            .messages
            .read()
            .await
            .get(&conversation_id)
            .map_or(0, Vec::len))
    }
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn create(&self, document: Document) -> Result<Document> {
        self.documents
            .write()
            .await
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationMode, Role};

    #[tokio::test]
    async fn test_conversation_roundtrip() {
        let store = InMemoryStore::new();
        let conversation = Conversation::new("demo", ConversationMode::OpenChat, None);
        let id = conversation.id;

        ConversationRepository::create(&store, conversation).await.unwrap();
        let found = ConversationRepository::get(&store, id).await.unwrap().unwrap();
        assert_eq!(found.owner_id, "demo");
        assert!(ConversationRepository::get(&store, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_keep_creation_order() {
        let store = InMemoryStore::new();
        let conversation = ConversationRepository::create(
            &store,
            Conversation::new("demo", ConversationMode::OpenChat, None),
        )
        .await
        .unwrap();

        for (role, text) in [(Role::User, "one"), (Role::Assistant, "two"), (Role::User, "three")] {
            MessageRepository::create(&store, StoredMessage::new(conversation.id, role, text, 0))
                .await
                .unwrap();
        }

        let messages = store.list_by_conversation(conversation.id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(store.count_by_conversation(conversation.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_message_for_unknown_conversation() {
        let store = InMemoryStore::new();
        let orphan = StoredMessage::new(Uuid::new_v4(), Role::User, "hi", 0);
        let result = MessageRepository::create(&store, orphan).await;
        assert!(matches!(result, Err(AppError::ConversationNotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_cascades_messages() {
        let store = InMemoryStore::new();
        let conversation = ConversationRepository::create(
            &store,
            Conversation::new("demo", ConversationMode::OpenChat, None),
        )
        .await
        .unwrap();
        MessageRepository::create(&store, StoredMessage::new(conversation.id, Role::User, "hi", 0))
            .await
            .unwrap();

        assert!(store.delete(conversation.id).await.unwrap());
        assert!(!store.delete(conversation.id).await.unwrap());
        assert_eq!(store.count_by_conversation(conversation.id).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_delete_racing_message_writes_leaves_no_orphans() {
        for _ in 0..20 {
            let store = std::sync::Arc::new(InMemoryStore::new());
            let conversation = ConversationRepository::create(
                store.as_ref(),
                Conversation::new("demo", ConversationMode::OpenChat, None),
            )
            .await
            .unwrap();
            let id = conversation.id;

            let writers: Vec<_> = (0..16)
                .map(|i| {
                    let store = store.clone();
                    tokio::spawn(async move {
                        let message = StoredMessage::new(id, Role::User, format!("message {i}"), 0);
                        let _ = MessageRepository::create(store.as_ref(), message).await;
                    })
                })
                .collect();
            let deleter = {
                let store = store.clone();
                tokio::spawn(async move { store.delete(id).await.unwrap() })
            };

            for writer in writers {
                writer.await.unwrap();
            }
            assert!(deleter.await.unwrap());
            assert_eq!(store.count_by_conversation(id).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_list_by_owner_filters_and_orders() {
        let store = InMemoryStore::new();
        let mut older = Conversation::new("alice", ConversationMode::OpenChat, None);
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = Conversation::new("alice", ConversationMode::Rag, None);
        let other = Conversation::new("bob", ConversationMode::OpenChat, None);

        for conversation in [older.clone(), newer.clone(), other] {
            ConversationRepository::create(&store, conversation).await.unwrap();
        }

        let listed = store.list_by_owner("alice").await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn test_record_usage_accumulates() {
        let store = InMemoryStore::new();
        let conversation = ConversationRepository::create(
            &store,
            Conversation::new("demo", ConversationMode::OpenChat, None),
        )
        .await
        .unwrap();

        store.record_usage(conversation.id, 40).await.unwrap();
        store.record_usage(conversation.id, 2).await.unwrap();
        let found = ConversationRepository::get(&store, conversation.id).await.unwrap().unwrap();
        assert_eq!(found.total_tokens, 42);

        let missing = store.record_usage(Uuid::new_v4(), 1).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_documents() {
        let store = InMemoryStore::new();
        let document = DocumentRepository::create(&store, Document::new("paper.pdf", "text"))
            .await
            .unwrap();
        let found = DocumentRepository::get(&store, document.id).await.unwrap().unwrap();
        assert_eq!(found.filename, "paper.pdf");
    }
}
