//! Domain models
//!
//! Plain records shared between the context core, the repositories and the
//! HTTP layer.

mod conversation;
mod document;
mod message;

pub use conversation::{Conversation, ConversationMode};
pub use document::Document;
pub use message::{Message, Role, StoredMessage};
