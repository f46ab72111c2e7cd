//! Conversation service
//!
//! Orchestrates a turn: load history or document text, run it through the
//! context core (chunk, retrieve, truncate, assemble), call the chat model
//! and persist both sides of the exchange.

use chrono::{DateTime, Utc};
use docchat_common::{
    config::AppConfig,
    context::{assemble, estimated_tokens, truncate_messages, PreparedPrompt, PromptInput},
    errors::{AppError, Result},
    llm::{ChatModel, Completion},
    metrics,
    models::{Conversation, ConversationMode, Message, Role, StoredMessage},
    repository::{ConversationRepository, DocumentRepository, MessageRepository},
};
use docchat_ingestion::chunk_text;
use docchat_search::retrieve;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Context parameters applied to every turn
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    pub system_prompt: String,
    pub max_context_tokens: usize,
    pub chunk_size: usize,
    pub top_k: usize,
    /// Deadline for one model call
    pub model_timeout: Duration,
}

impl ConversationSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            system_prompt: config.context.system_prompt.clone(),
            max_context_tokens: config.context.max_tokens,
            chunk_size: config.retrieval.chunk_size,
            top_k: config.retrieval.top_k,
            model_timeout: config.model_call_timeout(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedConversation {
    pub conversation_id: Uuid,
    pub reply: String,
    /// Retrieved chunks, empty for open chat
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub message_id: Uuid,
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct RagReply {
    pub message_id: Uuid,
    pub reply: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    pub id: Uuid,
    pub title: Option<String>,
    pub mode: ConversationMode,
    pub document_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_tokens: u64,
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: Option<String>,
    pub mode: ConversationMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub total_tokens: u64,
}

pub struct ConversationService {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    documents: Arc<dyn DocumentRepository>,
    model: Arc<dyn ChatModel>,
    settings: ConversationSettings,
}

impl ConversationService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        documents: Arc<dyn DocumentRepository>,
        model: Arc<dyn ChatModel>,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            conversations,
            messages,
            documents,
            model,
            settings,
        }
    }

    /// Build a service whose repositories all live in one store
    pub fn with_store<S>(store: Arc<S>, model: Arc<dyn ChatModel>, settings: ConversationSettings) -> Self
    where
        S: ConversationRepository + MessageRepository + DocumentRepository + 'static,
    {
        Self::new(store.clone(), store.clone(), store, model, settings)
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Start a conversation and answer its first message
    #[instrument(skip(self, first_message))]
    pub async fn create_conversation(
        &self,
        owner_id: &str,
        first_message: &str,
        mode: ConversationMode,
        document_id: Option<Uuid>,
    ) -> Result<CreatedConversation> {
        require_content(first_message, "first_message")?;

        let document_text = match document_id {
            Some(id) => Some(self.load_document_text(id).await?),
            None => None,
        };

        // Retrieval only applies when a document backs the conversation
        let prompt = match (mode, document_text.as_deref()) {
            (ConversationMode::Rag, Some(text)) => self.augmented_prompt(first_message, text),
            _ => self.chat_prompt(&[Message::user(first_message)])?,
        };

        let conversation = Conversation::new(owner_id, mode, document_id).with_title_from(first_message);
        let conversation = self.conversations.create(conversation).await?;
        info!(conversation_id = %conversation.id, "Conversation created");

        self.store_user_message(conversation.id, first_message).await?;
        let completion = self.generate(prompt.clone(), mode).await?;
        self.store_reply(conversation.id, &completion).await?;

        Ok(CreatedConversation {
            conversation_id: conversation.id,
            reply: completion.content,
            sources: prompt.sources,
        })
    }

    /// Answer a message using the conversation history
    #[instrument(skip(self, content))]
    pub async fn add_message(&self, conversation_id: Uuid, content: &str) -> Result<ChatReply> {
        require_content(content, "content")?;
        self.require_conversation(conversation_id).await?;

        let mut history: Vec<Message> = self
            .messages
            .list_by_conversation(conversation_id)
            .await?
            .iter()
            .map(Message::from)
            .collect();
        history.push(Message::user(content));

        // Nothing is stored when even the new message is over budget
        let prompt = self.chat_prompt(&history)?;

        self.store_user_message(conversation_id, content).await?;
        let completion = self.generate(prompt, ConversationMode::OpenChat).await?;
        let reply = self.store_reply(conversation_id, &completion).await?;

        Ok(ChatReply {
            message_id: reply.id,
            reply: completion.content,
        })
    }

    /// Answer a question from retrieved document chunks.
    ///
    /// Uses `document_text` when given, otherwise the document attached to
    /// the conversation.
    #[instrument(skip(self, question, document_text))]
    pub async fn add_rag_message(
        &self,
        conversation_id: Uuid,
        question: &str,
        document_text: Option<&str>,
    ) -> Result<RagReply> {
        require_content(question, "content")?;
        let conversation = self.require_conversation(conversation_id).await?;

        let text = match (document_text.filter(|t| !t.trim().is_empty()), conversation.document_id) {
            (Some(text), _) => text.to_string(),
            (None, Some(document_id)) => self.load_document_text(document_id).await?,
            (None, None) => {
                return Err(AppError::Validation {
                    message: "document_text is required when no document is attached".to_string(),
                    field: Some("document_text".to_string()),
                })
            }
        };

        let prompt = self.augmented_prompt(question, &text);
        if prompt.sources.is_empty() {
            warn!(conversation_id = %conversation_id, "Document produced no chunks");
        }

        self.store_user_message(conversation_id, question).await?;
        let completion = self.generate(prompt.clone(), ConversationMode::Rag).await?;
        let reply = self.store_reply(conversation_id, &completion).await?;

        Ok(RagReply {
            message_id: reply.id,
            reply: completion.content,
            sources: prompt.sources,
        })
    }

    pub async fn get_conversation(&self, conversation_id: Uuid) -> Result<ConversationDetail> {
        let conversation = self.require_conversation(conversation_id).await?;
        let messages = self.messages.list_by_conversation(conversation_id).await?;

        Ok(ConversationDetail {
            id: conversation.id,
            title: conversation.title,
            mode: conversation.mode,
            document_id: conversation.document_id,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            total_tokens: conversation.total_tokens,
            messages,
        })
    }

    /// Conversations of an owner, newest first, with message counts
    pub async fn list_conversations(&self, owner_id: &str) -> Result<Vec<ConversationSummary>> {
        let conversations = self.conversations.list_by_owner(owner_id).await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let message_count = self.messages.count_by_conversation(conversation.id).await?;
            summaries.push(ConversationSummary {
                id: conversation.id,
                title: conversation.title,
                mode: conversation.mode,
                created_at: conversation.created_at,
                updated_at: conversation.updated_at,
                message_count,
                total_tokens: conversation.total_tokens,
            });
        }

        Ok(summaries)
    }

    #[instrument(skip(self))]
    pub async fn delete_conversation(&self, conversation_id: Uuid) -> Result<()> {
        if !self.conversations.delete(conversation_id).await? {
            return Err(AppError::ConversationNotFound {
                id: conversation_id.to_string(),
            });
        }
        info!(conversation_id = %conversation_id, "Conversation deleted");
        Ok(())
    }

    /// Truncate history to the context budget and assemble an open-chat prompt
    fn chat_prompt(&self, history: &[Message]) -> Result<PreparedPrompt> {
        let budget = self.settings.max_context_tokens;
        let window = truncate_messages(history, budget);

        if window.is_empty() {
            let latest = history.last().map_or(0.0, |m| estimated_tokens(&m.content));
            return Err(AppError::ContextBudgetExceeded {
                estimated_tokens: latest,
                budget,
            });
        }

        let dropped = history.len() - window.len();
        metrics::record_truncation(window.len(), dropped);
        if dropped > 0 {
            info!(kept = window.len(), dropped = dropped, "History truncated to context budget");
        }

        Ok(assemble(&self.settings.system_prompt, PromptInput::Chat { history: window }))
    }

    /// Chunk the document, keep the best chunks and wrap them around the question
    fn augmented_prompt(&self, question: &str, document_text: &str) -> PreparedPrompt {
        let chunks = chunk_text(document_text, self.settings.chunk_size);
        let relevant = retrieve(question, &chunks, self.settings.top_k);

        assemble(
            &self.settings.system_prompt,
            PromptInput::Augmented {
                question,
                chunks: &relevant,
            },
        )
    }

    /// Call the model; failures keep the prompt that was about to be sent
    async fn generate(&self, prompt: PreparedPrompt, mode: ConversationMode) -> Result<Completion> {
        let start = Instant::now();
        let timeout = self.settings.model_timeout;
        let result = tokio::time::timeout(timeout, self.model.complete(&prompt.messages))
            .await
            .unwrap_or_else(|_| {
                Err(AppError::Upstream {
                    message: format!("Model did not answer within {:?}", timeout),
                })
            });
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(completion) => {
                metrics::record_model_call(elapsed, self.model.model_name(), mode.as_str(), completion.tokens, true);
                Ok(completion)
            }
            Err(e) => {
                metrics::record_model_call(elapsed, self.model.model_name(), mode.as_str(), 0, false);
                warn!(error = %e, turns = prompt.turn_count(), "Model call failed");
                Err(AppError::ModelCall {
                    message: e.to_string(),
                    prompt: Box::new(prompt),
                })
            }
        }
    }

    async fn require_conversation(&self, conversation_id: Uuid) -> Result<Conversation> {
        self.conversations
            .get(conversation_id)
            .await?
            .ok_or_else(|| AppError::ConversationNotFound {
                id: conversation_id.to_string(),
            })
    }

    async fn load_document_text(&self, document_id: Uuid) -> Result<String> {
        self.documents
            .get(document_id)
            .await?
            .map(|d| d.content)
            .ok_or_else(|| AppError::DocumentNotFound {
                id: document_id.to_string(),
            })
    }

    async fn store_user_message(&self, conversation_id: Uuid, content: &str) -> Result<StoredMessage> {
        let tokens = estimated_tokens(content).ceil() as u32;
        self.messages
            .create(StoredMessage::new(conversation_id, Role::User, content, tokens))
            .await
    }

    async fn store_reply(&self, conversation_id: Uuid, completion: &Completion) -> Result<StoredMessage> {
        let reply = self
            .messages
            .create(StoredMessage::new(
                conversation_id,
                Role::Assistant,
                completion.content.clone(),
                completion.tokens,
            ))
            .await?;
        self.conversations
            .record_usage(conversation_id, completion.tokens)
            .await?;
        Ok(reply)
    }
}

fn require_content(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation {
            message: format!("{} must not be empty", field),
            field: Some(field.to_string()),
        });
    }
    Ok(())
}
