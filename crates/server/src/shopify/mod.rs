//! Shopify Admin API access for arbitrary, model-generated queries.
//!
//! Unlike a typed client, queries here are plain strings and results are
//! untyped JSON: the chat pipeline cannot know the shape of a query before
//! the model writes it.
//!
//! # Example
//!
//! ```rust,ignore
//! use chatbi_server::shopify::ShopifyClient;
//!
//! let shopify = ShopifyClient::new(&config.shopify, config.http_timeout)?;
//! let data = shopify
//!     .run_query("acme.myshopify.com", &token, "{ shop { name } }", None)
//!     .await?;
//! ```

mod client;
pub mod hmac;

pub use client::{AccessToken, ShopifyClient};

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when interacting with Shopify.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed (includes timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Shopify answered with a non-success status.
    #[error("Shopify API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// OAuth URL building or code exchange failed.
    #[error("OAuth error: {0}")]
    OAuth(String),
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    #[serde(default)]
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_formatting() {
        let errors = vec![
            GraphQLError {
                message: "Field 'revenue' doesn't exist on type 'Order'".to_string(),
                locations: vec![GraphQLErrorLocation { line: 1, column: 12 }],
                path: vec![],
            },
            GraphQLError {
                message: "Invalid search query".to_string(),
                locations: vec![],
                path: vec![],
            },
        ];
        let err = ShopifyError::GraphQL(errors);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Field 'revenue' doesn't exist on type 'Order'; Invalid search query"
        );
    }

    #[test]
    fn test_status_error_carries_body() {
        let err = ShopifyError::Status {
            status: 404,
            body: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "Shopify API error (404): Not Found");
    }

    #[test]
    fn test_graphql_error_deserializes_without_optional_fields() {
        let error: GraphQLError =
            serde_json::from_str(r#"{"message":"Throttled"}"#).expect("deserialize");
        assert_eq!(error.message, "Throttled");
        assert!(error.locations.is_empty());
    }
}
