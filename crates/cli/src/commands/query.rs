//! Query command: run one GraphQL document against a shop.
//!
//! # Environment Variables
//!
//! - `SHOP_DOMAIN`, `SHOP_ACCESS_TOKEN`, `SHOPIFY_GRAPHQL` - flag fallbacks
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2024-10)
//! - `SHOPIFY_SCOPES` - Scopes that must be granted before the query runs

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use thiserror::Error;

use chatbi_core::{ShopDomain, ShopDomainError, chart_points, normalize, pick_keys, sanitize};
use chatbi_server::config::{
    DEFAULT_SHOPIFY_API_VERSION, DEFAULT_SHOPIFY_SCOPES, ShopifyConfig, parse_scopes,
};
use chatbi_server::shopify::{ShopifyClient, ShopifyError};

const TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from the query command.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid shop: {0}")]
    InvalidShop(#[from] ShopDomainError),

    #[error("Missing scopes: {}", .0.join(", "))]
    MissingScopes(Vec<String>),

    #[error(transparent)]
    Shopify(#[from] ShopifyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Check scopes, run the query and print the result.
///
/// # Errors
///
/// Returns an error if the shop is invalid, a required scope is missing, or
/// the query fails.
pub async fn run(shop: &str, token: String, query: &str, table: bool) -> Result<(), QueryError> {
    let _ = dotenvy::dotenv();

    let shop = ShopDomain::parse(shop)?;
    let token = SecretString::from(token);
    let config = shopify_config();
    let client = ShopifyClient::new(&config, TIMEOUT)?;

    let missing = client
        .missing_scopes(shop.as_str(), token.expose_secret(), &config.scopes)
        .await?;
    if !missing.is_empty() {
        return Err(QueryError::MissingScopes(missing));
    }

    let query = sanitize(query);
    tracing::info!(shop = %shop, "Running query");
    let data = client
        .run_query(shop.as_str(), token.expose_secret(), &query, None)
        .await?;

    let output = if table { tabulate(&data) } else { data };

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

/// The app credentials are not needed to run a query with an existing token.
fn shopify_config() -> ShopifyConfig {
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

    ShopifyConfig {
        api_version: env("SHOPIFY_API_VERSION")
            .unwrap_or_else(|| DEFAULT_SHOPIFY_API_VERSION.to_string()),
        api_key: String::new(),
        api_secret: SecretString::from(String::new()),
        scopes: parse_scopes(
            &env("SHOPIFY_SCOPES").unwrap_or_else(|| DEFAULT_SHOPIFY_SCOPES.to_string()),
        ),
    }
}

fn tabulate(data: &Value) -> Value {
    let table = normalize(data);
    let chart = pick_keys(&table.rows);
    let points = chart_points(&table.rows, &chart);
    json!({ "table": table, "chart": chart, "points": points })
}
