//! Chat route: answers a question as an NDJSON event stream.

use std::convert::Infallible;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use futures::{Stream, StreamExt};
use tracing::instrument;

use chatbi_core::ChatStreamEvent;

use crate::services::{ChatError, ChatRequest};
use crate::state::AppState;

/// Content type of the event stream.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson; charset=utf-8";

/// Build the chat router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(chat))
}

/// POST /api/chat - Validate, then stream the pipeline's events.
///
/// Validation, token and scope failures are plain JSON error responses.
/// Once the stream starts the status is 200 and failures arrive as a
/// terminal `error` event.
#[instrument(skip(state, body))]
async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ChatError> {
    let request = ChatRequest::from_slice(&body)?;

    let service = state.chat_service();
    let prepared = service.prepare(request).await?;

    Ok(ndjson_response(service.stream(prepared)))
}

/// Wrap an event stream in a streaming NDJSON response.
pub fn ndjson_response(events: impl Stream<Item = ChatStreamEvent> + Send + 'static) -> Response {
    let lines = events.map(|event| Ok::<_, Infallible>(Bytes::from(event.to_ndjson_line())));

    (
        [(CONTENT_TYPE, NDJSON_CONTENT_TYPE), (CACHE_CONTROL, "no-cache")],
        Body::from_stream(lines),
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        router().with_state(AppState::for_tests())
    }

    async fn post_chat(body: &'static str) -> (StatusCode, Value) {
        let response = app()
            .oneshot(
                Request::post("/api/chat")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_non_json_body_is_bad_request() {
        let (status, body) = post_chat("question=revenue").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Request body must be JSON"));
    }

    #[tokio::test]
    async fn test_blank_message_is_bad_request() {
        let (status, body) =
            post_chat(r#"{"message":"  ","shopDomain":"acme.myshopify.com"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing message" }));
    }

    #[tokio::test]
    async fn test_missing_shop_is_bad_request() {
        let (status, body) = post_chat(r#"{"message":"Revenue last week?"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing shopDomain" }));
    }

    #[tokio::test]
    async fn test_ndjson_response_framing() {
        let events = futures::stream::iter(vec![
            ChatStreamEvent::status("Generating query..."),
            ChatStreamEvent::error("boom"),
        ]);
        let response = ndjson_response(events);

        assert_eq!(response.headers()[CONTENT_TYPE], NDJSON_CONTENT_TYPE);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(
            lines,
            vec![
                json!({ "type": "status", "message": "Generating query..." }),
                json!({ "type": "error", "message": "boom" }),
            ]
        );
    }
}
