//! Conversation handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::services::conversation::{
    ChatReply, ConversationDetail, ConversationSummary, CreatedConversation, RagReply,
};
use crate::AppState;
use docchat_common::{errors::Result, models::ConversationMode};

/// Request to start a conversation
#[derive(Debug, Deserialize, Validate)]
pub struct CreateConversationRequest {
    #[validate(length(min = 1, max = 20000))]
    pub first_message: String,

    #[serde(default)]
    pub mode: ConversationMode,

    /// Uploaded document to answer from (rag mode)
    pub document_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMessageRequest {
    #[validate(length(min = 1, max = 20000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddRagMessageRequest {
    /// The question
    #[validate(length(min = 1, max = 20000))]
    pub content: String,

    /// Text to answer from; falls back to the attached document
    pub document_text: Option<String>,
}

/// Create a conversation and answer its first message
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<CreatedConversation>)> {
    request.validate()?;

    let created = state
        .conversations
        .create_conversation(
            &state.config.server.default_owner,
            &request.first_message,
            request.mode,
            request.document_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// List conversations of the default owner
pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationSummary>>> {
    let conversations = state
        .conversations
        .list_conversations(&state.config.server.default_owner)
        .await?;
    Ok(Json(conversations))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<ConversationDetail>> {
    Ok(Json(state.conversations.get_conversation(conversation_id).await?))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.conversations.delete_conversation(conversation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Open-chat turn
pub async fn add_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<AddMessageRequest>,
) -> Result<Json<ChatReply>> {
    request.validate()?;

    let reply = state
        .conversations
        .add_message(conversation_id, &request.content)
        .await?;
    Ok(Json(reply))
}

/// Retrieval-augmented turn
pub async fn add_rag_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<AddRagMessageRequest>,
) -> Result<Json<RagReply>> {
    request.validate()?;

    let reply = state
        .conversations
        .add_rag_message(
            conversation_id,
            &request.content,
            request.document_text.as_deref(),
        )
        .await?;
    Ok(Json(reply))
}
