//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (`x-request-id`, recorded on the span and Sentry scope)
//! 4. CORS
//! 5. Session layer (tower-sessions with `PostgreSQL` store, OAuth state and installed shops)
//!
//! `ShopAccess` is an extractor, not a layer: history routes use it to require
//! an installing session or the shop's access token.

pub mod request_id;
pub mod session;
pub mod shop_access;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use session::{SESSION_COOKIE_NAME, SessionSetupError, create_session_layer};
pub use shop_access::{ShopAccess, grant_shop_access};
