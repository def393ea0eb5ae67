//! Domain models for shops and stored conversations.

pub mod conversation;
pub mod shop;

pub use conversation::{Conversation, ConversationDetail, Message};
pub use shop::Shop;
