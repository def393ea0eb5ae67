//! Claude API integration.
//!
//! The chat pipeline makes two single-shot calls per question: one that turns
//! the question into a GraphQL query and one that explains the result. Both
//! go through [`ClaudeClient::complete`], which returns the concatenated text
//! blocks of the reply.
//!
//! # Example
//!
//! ```rust,ignore
//! use chatbi_server::claude::{ClaudeClient, Message};
//!
//! let claude = ClaudeClient::new(&config.claude, config.http_timeout)?;
//! let text = claude
//!     .complete("You are terse.", &[Message::user("Hello")], 500)
//!     .await?;
//! ```

mod client;
mod error;
mod types;

pub use client::ClaudeClient;
pub use error::ClaudeError;
pub use types::{ContentBlock, Message, MessagesRequest, MessagesResponse, Role, StopReason, Usage};
