//! Context core
//!
//! Turns a running conversation or a set of retrieved chunks into the
//! bounded message list handed to the chat model:
//! - Token estimation and history truncation
//! - Prompt assembly (open chat and retrieval-augmented)

mod assembler;
mod truncator;

pub use assembler::{assemble, augmented_prompt, PreparedPrompt, PromptInput};
pub use truncator::{estimated_tokens, total_estimated_tokens, truncate_messages};
