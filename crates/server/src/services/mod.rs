//! Business logic services.
//!
//! # Services
//!
//! - `chat` - Question → GraphQL → Shopify → answer pipeline, streamed as NDJSON events
//! - `export` - CSV rendering of normalized result rows

pub mod chat;
pub mod export;

pub use chat::{ChatError, ChatRequest, ChatService, PgChatStore};
pub use export::{ExportError, rows_to_csv, safe_file_name};
