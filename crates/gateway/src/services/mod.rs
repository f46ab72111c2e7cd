//! Application services

pub mod conversation;

pub use conversation::{ConversationService, ConversationSettings};
