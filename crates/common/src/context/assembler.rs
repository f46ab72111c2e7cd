//! Prompt Assembler - Composes the message list sent to the chat model
//!
//! Two modes:
//! - Open chat: system directive followed by the bounded history
//! - Retrieval-augmented: system directive followed by one synthetic user
//!   message that embeds the retrieved chunks and the question

use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Separator between retrieved chunks inside the augmented prompt
const CHUNK_SEPARATOR: &str = "\n\n";

/// What the prompt is built from
#[derive(Debug, Clone, Copy)]
pub enum PromptInput<'a> {
    /// Prior messages, already truncated to the context budget
    Chat { history: &'a [Message] },
    /// A question answered from retrieved document chunks
    Augmented {
        question: &'a str,
        chunks: &'a [String],
    },
}

/// The final message list plus the material it was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedPrompt {
    /// Messages handed to the model, system directive first
    pub messages: Vec<Message>,

    /// Verbatim question (retrieval mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,

    /// Retrieved chunks in retrieval order (empty in open chat)
    pub sources: Vec<String>,
}

/// Build the augmented user message for a question over retrieved chunks
pub fn augmented_prompt(question: &str, chunks: &[String]) -> String {
    let context = chunks.join(CHUNK_SEPARATOR);
    format!(
        "Use the following document context to answer the question.\n\n\
        Context:\n{}\n\n\
        Question:\n{}",
        context, question
    )
}

/// Compose the message list for the chat model.
///
/// Inputs are borrowed and copied; the returned prompt owns fresh data.
pub fn assemble(system_directive: &str, input: PromptInput<'_>) -> PreparedPrompt {
    match input {
        PromptInput::Chat { history } => {
            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(Message::system(system_directive));
            messages.extend(history.iter().cloned());

            PreparedPrompt {
                messages,
                question: None,
                sources: Vec::new(),
            }
        }
        PromptInput::Augmented { question, chunks } => PreparedPrompt {
            messages: vec![
                Message::system(system_directive),
                Message::user(augmented_prompt(question, chunks)),
            ],
            question: Some(question.to_string()),
            sources: chunks.to_vec(),
        },
    }
}

impl PreparedPrompt {
    /// Number of messages excluding the system directive
    pub fn turn_count(&self) -> usize {
        self.messages.len().saturating_sub(1)
    }
}
