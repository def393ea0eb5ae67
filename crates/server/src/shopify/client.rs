//! Shopify Admin GraphQL execution and OAuth token exchange.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use chatbi_core::ShopDomain;

use crate::config::ShopifyConfig;

use super::{GraphQLError, ShopifyError};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

const ACCESS_SCOPES_QUERY: &str = "{ currentAppInstallation { accessScopes { handle } } }";

/// Offline access token returned by the OAuth code exchange.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct AccessToken {
    /// Token for the `X-Shopify-Access-Token` header.
    pub access_token: SecretString,
    /// Comma-separated granted scopes, when Shopify reports them.
    pub scope: Option<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    scope: Option<String>,
}

/// Shopify Admin API client.
///
/// Holds the app credentials only. Per-shop access tokens are passed to each
/// call, so one client serves every installed shop.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    client: reqwest::Client,
    api_version: String,
    api_key: String,
    api_secret: SecretString,
    /// Replaces `https://{shop}` in every URL when set.
    base_url: Option<String>,
}

impl ShopifyClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ShopifyConfig, timeout: Duration) -> Result<Self, ShopifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                client,
                api_version: config.api_version.clone(),
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.clone(),
                base_url: None,
            }),
        })
    }

    /// Send every request to `base_url` instead of the shop's own host.
    #[must_use]
    pub fn with_base_url(self, base_url: &str) -> Self {
        let inner = ShopifyClientInner {
            client: self.inner.client.clone(),
            api_version: self.inner.api_version.clone(),
            api_key: self.inner.api_key.clone(),
            api_secret: self.inner.api_secret.clone(),
            base_url: Some(base_url.trim_end_matches('/').to_string()),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The app client ID.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    /// The app secret (signs OAuth callbacks).
    #[must_use]
    pub fn api_secret(&self) -> &str {
        self.inner.api_secret.expose_secret()
    }

    fn origin(&self, shop: &str) -> String {
        self.inner
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{shop}"))
    }

    /// GraphQL endpoint for a shop.
    #[must_use]
    pub fn graphql_endpoint(&self, shop: &str) -> String {
        format!(
            "{}/admin/api/{}/graphql.json",
            self.origin(shop),
            self.inner.api_version
        )
    }

    // =========================================================================
    // GraphQL Execution
    // =========================================================================

    /// Execute a raw GraphQL document.
    ///
    /// Returns the `data` member of the response, or the whole response body
    /// when `data` is absent or null.
    ///
    /// # Errors
    ///
    /// - `RateLimited` / `Unauthorized` for 429 / 401 responses
    /// - `Status` with the body for any other non-success response
    /// - `GraphQL` when the response carries a non-empty `errors` list
    #[instrument(skip(self, access_token, query, variables), fields(shop = %shop))]
    pub async fn run_query(
        &self,
        shop: &str,
        access_token: &str,
        query: &str,
        variables: Option<&Value>,
    ) -> Result<Value, ShopifyError> {
        let body = match variables {
            Some(variables) => json!({ "query": query, "variables": variables }),
            None => json!({ "query": query }),
        };

        let response = self
            .inner
            .client
            .post(self.graphql_endpoint(shop))
            .header(ACCESS_TOKEN_HEADER, access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<f64>().ok())
                .map_or(60, |secs| secs.ceil() as u64);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShopifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Value = response.json().await?;
        unwrap_envelope(envelope)
    }

    /// Scopes granted to the app on this shop.
    ///
    /// # Errors
    ///
    /// Returns an error if the scope query fails.
    #[instrument(skip(self, access_token), fields(shop = %shop))]
    pub async fn granted_scopes(
        &self,
        shop: &str,
        access_token: &str,
    ) -> Result<Vec<String>, ShopifyError> {
        let data = self
            .run_query(shop, access_token, ACCESS_SCOPES_QUERY, None)
            .await?;
        Ok(scope_handles(&data))
    }

    /// Required scopes that the app has not been granted, in `required` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the scope query fails.
    pub async fn missing_scopes(
        &self,
        shop: &str,
        access_token: &str,
        required: &[String],
    ) -> Result<Vec<String>, ShopifyError> {
        let granted = self.granted_scopes(shop, access_token).await?;
        Ok(missing_from(required, &granted))
    }

    // =========================================================================
    // OAuth Flow
    // =========================================================================

    /// Build the URL that asks the merchant to install the app.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` if the URL cannot be built.
    pub fn authorization_url(
        &self,
        shop: &ShopDomain,
        redirect_uri: &str,
        scopes: &[String],
        state: &str,
    ) -> Result<String, ShopifyError> {
        let base = format!("{}/admin/oauth/authorize", self.origin(shop.as_str()));
        let scope = scopes.join(",");
        let url = Url::parse_with_params(
            &base,
            &[
                ("client_id", self.inner.api_key.as_str()),
                ("scope", scope.as_str()),
                ("redirect_uri", redirect_uri),
                ("state", state),
            ],
        )
        .map_err(|e| ShopifyError::OAuth(format!("Invalid authorization URL: {e}")))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for an offline access token.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` with the response body if Shopify
    /// rejects the exchange, or `ShopifyError::Http` if the request fails.
    #[instrument(skip(self, code), fields(shop = %shop))]
    pub async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<AccessToken, ShopifyError> {
        let url = format!("{}/admin/oauth/access_token", self.origin(shop.as_str()));

        let response = self
            .inner
            .client
            .post(&url)
            .json(&json!({
                "client_id": self.inner.api_key,
                "client_secret": self.inner.api_secret.expose_secret(),
                "code": code,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ShopifyError::OAuth(format!("Token exchange failed: {text}")));
        }

        let token: OAuthTokenResponse = response.json().await?;
        Ok(AccessToken {
            access_token: SecretString::from(token.access_token),
            scope: token.scope,
        })
    }
}

/// Split a GraphQL response into data or errors.
fn unwrap_envelope(envelope: Value) -> Result<Value, ShopifyError> {
    if let Some(errors) = envelope.get("errors").filter(|e| !is_empty_errors(e)) {
        return Err(ShopifyError::GraphQL(parse_errors(errors)));
    }

    match envelope.get("data") {
        Some(data) if !data.is_null() => Ok(data.clone()),
        _ => Ok(envelope),
    }
}

fn is_empty_errors(errors: &Value) -> bool {
    match errors {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Shopify sometimes returns a bare string or object instead of a list.
fn parse_errors(errors: &Value) -> Vec<GraphQLError> {
    let items = match errors {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<GraphQLError>(item.clone()).unwrap_or_else(|_| GraphQLError {
                message: item.as_str().map_or_else(|| item.to_string(), String::from),
                locations: Vec::new(),
                path: Vec::new(),
            })
        })
        .collect()
}

fn scope_handles(data: &Value) -> Vec<String> {
    data.pointer("/currentAppInstallation/accessScopes")
        .and_then(Value::as_array)
        .map(|scopes| {
            scopes
                .iter()
                .filter_map(|s| s.get("handle").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// A `read_x` scope is implied by a granted `write_x`.
fn missing_from(required: &[String], granted: &[String]) -> Vec<String> {
    let granted: HashSet<&str> = granted.iter().map(String::as_str).collect();

    required
        .iter()
        .filter(|scope| {
            let implied = scope
                .strip_prefix("read_")
                .is_some_and(|resource| granted.contains(format!("write_{resource}").as_str()));
            !granted.contains(scope.as_str()) && !implied
        })
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_SHOPIFY_API_VERSION, parse_scopes};

    fn test_client(base_url: Option<&str>) -> ShopifyClient {
        let config = ShopifyConfig {
            api_version: DEFAULT_SHOPIFY_API_VERSION.to_string(),
            api_key: "app-key".to_string(),
            api_secret: SecretString::from("app-secret"),
            scopes: parse_scopes("read_orders"),
        };
        let client = ShopifyClient::new(&config, Duration::from_secs(5)).expect("client");
        match base_url {
            Some(url) => client.with_base_url(url),
            None => client,
        }
    }

    fn scopes(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_graphql_endpoint() {
        assert_eq!(
            test_client(None).graphql_endpoint("acme.myshopify.com"),
            "https://acme.myshopify.com/admin/api/2024-10/graphql.json"
        );
    }

    #[test]
    fn test_authorization_url() {
        let shop = ShopDomain::parse("acme.myshopify.com").unwrap();
        let url = test_client(None)
            .authorization_url(
                &shop,
                "https://app.test/api/auth/shopify/callback",
                &scopes(&["read_orders", "read_products"]),
                "st4te",
            )
            .unwrap();

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("acme.myshopify.com"));
        assert_eq!(parsed.path(), "/admin/oauth/authorize");
        let params: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(
            params,
            vec![
                ("client_id".to_string(), "app-key".to_string()),
                ("scope".to_string(), "read_orders,read_products".to_string()),
                (
                    "redirect_uri".to_string(),
                    "https://app.test/api/auth/shopify/callback".to_string()
                ),
                ("state".to_string(), "st4te".to_string()),
            ]
        );
    }

    #[test]
    fn test_unwrap_envelope_returns_data() {
        let data = unwrap_envelope(json!({ "data": { "shop": { "name": "Acme" } } })).unwrap();
        assert_eq!(data, json!({ "shop": { "name": "Acme" } }));
    }

    #[test]
    fn test_unwrap_envelope_falls_back_to_envelope() {
        let envelope = json!({ "extensions": { "cost": 1 } });
        assert_eq!(unwrap_envelope(envelope.clone()).unwrap(), envelope);

        let null_data = json!({ "data": null });
        assert_eq!(unwrap_envelope(null_data.clone()).unwrap(), null_data);
    }

    #[test]
    fn test_unwrap_envelope_errors() {
        let err = unwrap_envelope(json!({
            "data": null,
            "errors": [{ "message": "Field 'foo' doesn't exist", "locations": [{ "line": 1, "column": 3 }] }]
        }))
        .unwrap_err();
        assert!(matches!(err, ShopifyError::GraphQL(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("Field 'foo' doesn't exist"));

        let err = unwrap_envelope(json!({ "errors": "Not Found" })).unwrap_err();
        assert_eq!(err.to_string(), "GraphQL errors: Not Found");
    }

    #[test]
    fn test_empty_errors_list_is_not_an_error() {
        let data = unwrap_envelope(json!({ "data": { "a": 1 }, "errors": [] })).unwrap();
        assert_eq!(data, json!({ "a": 1 }));
    }

    #[test]
    fn test_missing_scopes() {
        let required = scopes(&["read_orders", "read_products", "read_customers"]);
        let granted = scopes(&["read_orders", "write_products"]);
        assert_eq!(missing_from(&required, &granted), scopes(&["read_customers"]));
        assert!(missing_from(&[], &granted).is_empty());
    }

    #[test]
    fn test_scope_handles() {
        let data = json!({
            "currentAppInstallation": {
                "accessScopes": [{ "handle": "read_orders" }, { "handle": "read_products" }]
            }
        });
        assert_eq!(scope_handles(&data), scopes(&["read_orders", "read_products"]));
        assert!(scope_handles(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn test_run_query_against_mock() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/admin/api/2024-10/graphql.json")
            .match_header("x-shopify-access-token", "shpat_test")
            .match_body(mockito::Matcher::Json(json!({ "query": "{ shop { name } }" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"shop":{"name":"Acme"}}}"#)
            .create_async()
            .await;

        let data = test_client(Some(&server.url()))
            .run_query("acme.myshopify.com", "shpat_test", "{ shop { name } }", None)
            .await
            .unwrap();

        assert_eq!(data, json!({ "shop": { "name": "Acme" } }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_query_status_error_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/admin/api/2024-10/graphql.json")
            .with_status(403)
            .with_body("Forbidden: missing read_orders")
            .create_async()
            .await;

        let err = test_client(Some(&server.url()))
            .run_query("acme.myshopify.com", "shpat_test", "{ orders { id } }", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShopifyError::Status { status: 403, ref body } if body == "Forbidden: missing read_orders"
        ));
    }

    #[tokio::test]
    async fn test_run_query_rate_limited_and_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/admin/api/2024-10/graphql.json")
            .match_header("x-shopify-access-token", "throttled")
            .with_status(429)
            .with_header("retry-after", "2.0")
            .create_async()
            .await;
        server
            .mock("POST", "/admin/api/2024-10/graphql.json")
            .match_header("x-shopify-access-token", "revoked")
            .with_status(401)
            .create_async()
            .await;

        let client = test_client(Some(&server.url()));
        let err = client
            .run_query("acme.myshopify.com", "throttled", "{ shop { id } }", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopifyError::RateLimited(2)));

        let err = client
            .run_query("acme.myshopify.com", "revoked", "{ shop { id } }", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopifyError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/admin/oauth/access_token")
            .match_body(mockito::Matcher::Json(json!({
                "client_id": "app-key",
                "client_secret": "app-secret",
                "code": "abc123"
            })))
            .with_status(200)
            .with_body(r#"{"access_token":"shpat_new","scope":"read_orders"}"#)
            .create_async()
            .await;

        let shop = ShopDomain::parse("acme.myshopify.com").unwrap();
        let token = test_client(Some(&server.url()))
            .exchange_code(&shop, "abc123")
            .await
            .unwrap();

        assert_eq!(token.access_token.expose_secret(), "shpat_new");
        assert_eq!(token.scope.as_deref(), Some("read_orders"));
        assert!(!format!("{token:?}").contains("shpat_new"));
        mock.assert_async().await;
    }
}
