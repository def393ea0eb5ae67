//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Chat
//! POST   /api/chat                        - Answer a question (NDJSON stream)
//!
//! # Shopify OAuth
//! GET    /api/auth/shopify/install?shop=  - Redirect to Shopify's consent screen
//! GET    /api/auth/shopify/callback       - Verify, exchange code, store token
//!
//! # History
//! GET    /api/conversations?shop=         - List a shop's conversations
//! GET    /api/conversations/{id}?shop=    - Conversation with messages
//! DELETE /api/conversations/{id}?shop=    - Delete a conversation
//!
//! # Derived views
//! POST   /api/insights                    - Table rows, chart keys and points
//! POST   /api/export/csv                  - Normalized rows as a CSV download
//! ```
//!
//! `/health` and `/health/ready` are mounted by the binary.

pub mod auth;
pub mod chat;
pub mod conversations;
pub mod insights;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(chat::router())
        .merge(auth::router())
        .merge(conversations::router())
        .merge(insights::router())
}
