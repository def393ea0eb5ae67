//! Conversation message roles.

use serde::{Deserialize, Serialize};

/// Author of a stored conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "chatbi.message_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// The merchant's question.
    User,
    /// The generated answer, with the query and data that produced it.
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}
