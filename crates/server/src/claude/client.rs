//! Claude API client for single-shot completions.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::config::ClaudeConfig;

use super::error::ClaudeError;
use super::types::{Message, MessagesRequest, MessagesResponse};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude API client.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct ClaudeClient {
    inner: Arc<ClaudeClientInner>,
}

struct ClaudeClientInner {
    client: reqwest::Client,
    model: String,
    messages_url: String,
}

impl ClaudeClient {
    /// Create a new Claude client.
    ///
    /// # Errors
    ///
    /// Returns `ClaudeError::Config` if the API key is not a valid header
    /// value, or `ClaudeError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClaudeConfig, timeout: Duration) -> Result<Self, ClaudeError> {
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|_| ClaudeError::Config("API key is not a valid header value".to_string()))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", api_key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClaudeClientInner {
                client,
                model: config.model.clone(),
                messages_url: format!("{ANTHROPIC_API_URL}{MESSAGES_PATH}"),
            }),
        })
    }

    /// Point the client at a different API host (proxies, local mocks).
    #[must_use]
    pub fn with_base_url(self, base_url: &str) -> Self {
        let inner = ClaudeClientInner {
            client: self.inner.client.clone(),
            model: self.inner.model.clone(),
            messages_url: format!("{}{MESSAGES_PATH}", base_url.trim_end_matches('/')),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Model ID used for every request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// Send one request and return the concatenated text of the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API returns an error
    /// status, or the reply contains no text.
    #[instrument(skip(self, system, messages), fields(model = %self.inner.model))]
    pub async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<String, ClaudeError> {
        let response = self.send(system, messages, max_tokens).await?;

        tracing::debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "Claude response received"
        );

        let text = response.text();
        if text.trim().is_empty() {
            return Err(ClaudeError::EmptyResponse);
        }
        Ok(text)
    }

    /// Send a request and return the raw response.
    async fn send(
        &self,
        system: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<MessagesResponse, ClaudeError> {
        let request = MessagesRequest {
            model: &self.inner.model,
            max_tokens,
            system: Some(system).filter(|s| !s.is_empty()),
            messages,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.messages_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = response.text().await?;
            return Err(ClaudeError::from_reply(status, retry_after.as_deref(), &body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ClaudeError::Parse(format!("Failed to parse response: {e}")))
    }
}
