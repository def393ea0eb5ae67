//! Integration tests for Shopify ChatBI.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the server against a migrated database
//! cargo run -p chatbi-server
//!
//! # Run integration tests
//! cargo test -p chatbi-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `CHATBI_BASE_URL` - Server under test (default: `http://localhost:3000`)
//! - `CHATBI_TEST_SHOP` - Installed development store, for live chat tests
//! - `CHATBI_TEST_TOKEN` - Its offline access token

use chatbi_core::ChatStreamEvent;
use reqwest::Client;

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("CHATBI_BASE_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Development store credentials, when configured.
#[must_use]
pub fn test_shop() -> Option<(String, String)> {
    let shop = std::env::var("CHATBI_TEST_SHOP").ok()?;
    let token = std::env::var("CHATBI_TEST_TOKEN").ok()?;
    Some((shop, token))
}

/// A client that keeps cookies and does not follow redirects.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Split an NDJSON body into events.
///
/// # Panics
///
/// Panics if a line is not a valid event.
#[must_use]
#[allow(clippy::expect_used)]
pub fn parse_events(body: &str) -> Vec<ChatStreamEvent> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("Invalid NDJSON event"))
        .collect()
}
