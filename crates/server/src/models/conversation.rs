//! Stored conversation models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use chatbi_core::{ConversationId, MessageId, MessageRole, ShopId};

/// A conversation between a merchant and the assistant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation ID.
    pub id: ConversationId,
    /// Shop this conversation belongs to.
    pub shop_id: ShopId,
    /// Title derived from the first question.
    pub title: Option<String>,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// When a message was last appended.
    pub updated_at: DateTime<Utc>,
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Who wrote the message.
    pub role: MessageRole,
    /// Question or answer text.
    pub content: String,
    /// Executed query (assistant messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Raw query result (assistant messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

/// A conversation with its messages in chronological order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    /// The conversation.
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Messages, oldest first.
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn conversation() -> Conversation {
        Conversation {
            id: ConversationId::from_uuid(Uuid::nil()),
            shop_id: ShopId::new(4),
            title: Some("Top products last month".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_conversation_serializes_camel_case() {
        let value = serde_json::to_value(conversation()).expect("serialize");
        assert_eq!(value["shopId"], 4);
        assert_eq!(value["title"], "Top products last month");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_detail_flattens_conversation() {
        let detail = ConversationDetail {
            conversation: conversation(),
            messages: vec![Message {
                id: MessageId::new(1),
                conversation_id: ConversationId::from_uuid(Uuid::nil()),
                role: MessageRole::User,
                content: "Top products last month?".to_string(),
                query: None,
                data: None,
                created_at: Utc::now(),
            }],
        };

        let value = serde_json::to_value(detail).expect("serialize");
        assert_eq!(value["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value["messages"][0].get("query").is_none());
        assert_eq!(value["messages"][0]["content"], json!("Top products last month?"));
    }
}
