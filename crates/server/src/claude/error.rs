//! Failures of a Claude completion call.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Wait assumed when a 429 carries no usable `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Errors returned by [`super::ClaudeClient`].
#[derive(Debug, Error)]
pub enum ClaudeError {
    /// Transport failure or timeout.
    #[error("request to Claude failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success reply, classified by the `error.type` of its body when the
    /// body is an Anthropic error envelope, otherwise by the HTTP status.
    #[error("Claude rejected the request ({kind}): {message}")]
    Api {
        /// `invalid_request_error`, `overloaded_error`, ... or the status.
        kind: String,
        /// Human-readable reason.
        message: String,
    },

    /// 429; seconds to wait.
    #[error("Claude is rate limiting requests, retry in {0}s")]
    RateLimited(u64),

    /// 401; the configured key was refused.
    #[error("Claude refused the configured API key")]
    Unauthorized,

    /// 2xx reply whose body is not a Messages response.
    #[error("unreadable Claude response: {0}")]
    Parse(String),

    /// The reply had no non-blank text block.
    #[error("model returned no text")]
    EmptyResponse,

    /// The client could not be constructed.
    #[error("client configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

impl ClaudeError {
    /// Classify a non-success reply.
    pub(crate) fn from_reply(status: StatusCode, retry_after: Option<&str>, body: &str) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(
                retry_after
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            ),
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            _ => match serde_json::from_str::<ErrorEnvelope>(body) {
                Ok(envelope) => Self::Api {
                    kind: envelope.error.kind,
                    message: envelope.error.message,
                },
                Err(_) => Self::Api {
                    kind: status.as_u16().to_string(),
                    message: Some(body.trim())
                        .filter(|b| !b.is_empty())
                        .or_else(|| status.canonical_reason())
                        .unwrap_or("no body")
                        .to_string(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_reads_retry_after() {
        let err = ClaudeError::from_reply(StatusCode::TOO_MANY_REQUESTS, Some(" 12 "), "");
        assert!(matches!(err, ClaudeError::RateLimited(12)));
        assert_eq!(err.to_string(), "Claude is rate limiting requests, retry in 12s");

        let err = ClaudeError::from_reply(StatusCode::TOO_MANY_REQUESTS, Some("soon"), "");
        assert!(matches!(err, ClaudeError::RateLimited(60)));
    }

    #[test]
    fn test_unauthorized_ignores_body() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        let err = ClaudeError::from_reply(StatusCode::UNAUTHORIZED, None, body);
        assert!(matches!(err, ClaudeError::Unauthorized));
    }

    #[test]
    fn test_overloaded_envelope() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = ClaudeError::from_reply(StatusCode::from_u16(529).unwrap_or_default(), None, body);
        assert_eq!(
            err.to_string(),
            "Claude rejected the request (overloaded_error): Overloaded"
        );
    }

    #[test]
    fn test_non_json_body_falls_back_to_status() {
        let err = ClaudeError::from_reply(StatusCode::BAD_GATEWAY, None, "<html>upstream</html>\n");
        let ClaudeError::Api { kind, message } = err else {
            panic!("expected Api error");
        };
        assert_eq!(kind, "502");
        assert_eq!(message, "<html>upstream</html>");

        let err = ClaudeError::from_reply(StatusCode::SERVICE_UNAVAILABLE, None, "  ");
        assert_eq!(
            err.to_string(),
            "Claude rejected the request (503): Service Unavailable"
        );
    }
}
