//! API handlers module

pub mod conversations;
pub mod documents;
pub mod health;
