//! NDJSON events emitted by the chat pipeline.
//!
//! Each event is serialized as one JSON object per line, tagged by `type`:
//!
//! ```text
//! {"type":"status","message":"Generating Shopify query..."}
//! {"type":"query","query":"{ orders(first: 10) { ... } }"}
//! {"type":"data","data":{...},"table":{...},"chart":{...}}
//! {"type":"answer","conversationId":"...","query":"...","data":{...},"answer":"...",...}
//! {"type":"error","message":"..."}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chart::{ChartKeys, pick_keys};
use crate::normalize::{NormalizedRows, normalize};
use crate::types::ConversationId;

/// One line of the chat response stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ChatStreamEvent {
    /// Progress message for the current stage.
    Status {
        /// Human-readable stage description.
        message: String,
    },
    /// The sanitized query about to be executed.
    Query {
        /// GraphQL document.
        query: String,
    },
    /// Raw query result with its derived views.
    Data {
        /// Raw result as returned by Shopify.
        data: Value,
        /// Rows located inside `data`.
        table: NormalizedRows,
        /// Chart keys for `table`.
        chart: ChartKeys,
    },
    /// Final answer. Always the last event of a successful stream.
    Answer {
        /// Conversation the exchange was stored in.
        conversation_id: ConversationId,
        /// Executed query.
        query: String,
        /// Raw query result.
        data: Value,
        /// Natural-language explanation.
        answer: String,
        /// Rows located inside `data`.
        table: NormalizedRows,
        /// Chart keys for `table`.
        chart: ChartKeys,
    },
    /// Terminal failure. Nothing follows an error event.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl ChatStreamEvent {
    /// Build a `status` event.
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    /// Build an `error` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Build a `data` event, deriving the table and chart views from `data`.
    #[must_use]
    pub fn data(data: Value) -> Self {
        let table = normalize(&data);
        let chart = pick_keys(&table.rows);
        Self::Data { data, table, chart }
    }

    /// Build an `answer` event, deriving the table and chart views from `data`.
    #[must_use]
    pub fn answer(
        conversation_id: ConversationId,
        query: String,
        data: Value,
        answer: String,
    ) -> Self {
        let table = normalize(&data);
        let chart = pick_keys(&table.rows);
        Self::Answer {
            conversation_id,
            query,
            data,
            answer,
            table,
            chart,
        }
    }

    /// Returns `true` for events after which the stream ends.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Answer { .. } | Self::Error { .. })
    }

    /// Serialize as a single NDJSON line, including the trailing newline.
    ///
    /// Serialization of these types cannot fail in practice; if it ever does,
    /// an `error` line is produced instead so the stream stays well-formed.
    #[must_use]
    pub fn to_ndjson_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","message":{}}}"#,
                Value::String(format!("Failed to encode event: {e}"))
            )
        });
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_status_line() {
        let line = ChatStreamEvent::status("Calling Shopify...").to_ndjson_line();
        assert_eq!(line, "{\"type\":\"status\",\"message\":\"Calling Shopify...\"}\n");
    }

    #[test]
    fn test_data_event_derives_views() {
        let event = ChatStreamEvent::data(json!({
            "products": { "nodes": [{ "title": "Tea", "totalInventory": 12 }] }
        }));
        let ChatStreamEvent::Data { table, chart, .. } = &event else {
            panic!("expected data event");
        };
        assert_eq!(table.source_path.as_deref(), Some("products.nodes"));
        assert_eq!(chart.value_key.as_deref(), Some("totalInventory"));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_answer_uses_camel_case_fields() {
        let event = ChatStreamEvent::answer(
            ConversationId::from_uuid(Uuid::nil()),
            "{ shop { name } }".to_string(),
            json!({ "shop": { "name": "Acme" } }),
            "Your shop is Acme.".to_string(),
        );
        let value: Value = serde_json::from_str(event.to_ndjson_line().trim_end()).expect("json");

        assert_eq!(value["type"], "answer");
        assert_eq!(value["conversationId"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(value["answer"], "Your shop is Acme.");
        assert_eq!(value["table"], json!({ "rows": [] }));
        assert_eq!(value["chart"], json!({ "nameKey": "name", "valueKey": null }));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_events_parse_back() {
        let line = r#"{"type":"error","message":"boom"}"#;
        let event: ChatStreamEvent = serde_json::from_str(line).expect("parse");
        assert_eq!(event, ChatStreamEvent::error("boom"));
        assert!(event.is_terminal());
    }
}
