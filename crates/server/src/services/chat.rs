//! Chat service: question → GraphQL → Shopify → answer.
//!
//! The flow for one request:
//! 1. Validate the request and resolve the shop's access token
//! 2. Check the app's granted scopes against the required ones
//! 3. Ask Claude for a query, sanitize it
//! 4. Execute it against the Shopify Admin API
//! 5. Ask Claude to explain the result
//! 6. Persist the exchange and emit the answer
//!
//! Steps 1-2 run before any response is sent and fail with an HTTP status.
//! Steps 3-6 run inside the NDJSON stream; a failure there ends the stream
//! with a single `error` event.

use std::future::Future;
use std::sync::Arc;

use askama::Template;
use futures::Stream;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use chatbi_core::{ChatStreamEvent, ConversationId, ShopDomain, ShopDomainError, sanitize};

use crate::claude::{ClaudeClient, ClaudeError, Message};
use crate::db::conversations::Exchange;
use crate::db::shops::TokenUpdate;
use crate::db::{ConversationRepository, RepositoryError, ShopRepository};
use crate::shopify::{ShopifyClient, ShopifyError};

const QUERY_MAX_TOKENS: u32 = 500;
const EXPLAIN_MAX_TOKENS: u32 = 700;

const DEFAULT_LOOKBACK_DAYS: u32 = 30;
const DEFAULT_PAGE_SIZE: u32 = 50;

const EXPLAIN_SYSTEM_PROMPT: &str =
    "You are a data analysis assistant. Explain query results concisely and plainly.";

const STATUS_GENERATING: &str = "Generating query...";
const STATUS_CALLING_SHOPIFY: &str = "Calling Shopify...";
const STATUS_EXPLAINING: &str = "Explaining results...";

/// System prompt describing the Shopify schema.
#[derive(Template)]
#[template(path = "prompts/text_to_graphql.txt")]
struct SchemaPrompt {
    default_days: u32,
    default_limit: u32,
}

/// User turn asking for a query.
#[derive(Template)]
#[template(path = "prompts/query_request.txt")]
struct QueryRequestPrompt<'a> {
    question: &'a str,
}

/// User turn asking for an explanation of a result.
#[derive(Template)]
#[template(path = "prompts/explain_result.txt")]
struct ExplainPrompt<'a> {
    question: &'a str,
    query: &'a str,
    result: &'a str,
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in the chat service.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The body is not a JSON object of the expected shape.
    #[error("Request body must be JSON: {0}")]
    InvalidBody(String),

    /// `message` is missing or blank.
    #[error("Missing message")]
    MissingMessage,

    /// `shopDomain` is missing or blank.
    #[error("Missing shopDomain")]
    MissingShop,

    /// `shopDomain` is not a `*.myshopify.com` domain.
    #[error("Invalid shopDomain: {0}")]
    InvalidShop(#[from] ShopDomainError),

    /// No token in the request and none stored for the shop.
    #[error(
        "No access token found for this shop. Install the Shopify app first, or pass accessToken in the request."
    )]
    MissingAccessToken,

    /// The app lacks required scopes on the shop.
    #[error(
        "The Shopify app is missing these scopes: {}. Reinstall the app to grant them.",
        .0.join(", ")
    )]
    MissingScopes(Vec<String>),

    /// Claude API error.
    #[error("Claude API error: {0}")]
    Claude(#[from] ClaudeError),

    /// Shopify API error.
    #[error("{0}")]
    Shopify(#[from] ShopifyError),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    /// A prompt template failed to render.
    #[error("prompt rendering failed: {0}")]
    Prompt(#[from] askama::Error),
}

impl ChatError {
    /// Message safe to send to the client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "Failed to save the conversation".to_string(),
            Self::Prompt(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

// =============================================================================
// Collaborators
// =============================================================================

/// Text completion backend.
pub trait LanguageModel: Clone + Send + Sync + 'static {
    /// Complete a single user turn under a system prompt.
    fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> impl Future<Output = Result<String, ClaudeError>> + Send;
}

impl LanguageModel for ClaudeClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, ClaudeError> {
        Self::complete(self, system, &[Message::user(user)], max_tokens).await
    }
}

/// Shop data backend.
pub trait StoreApi: Clone + Send + Sync + 'static {
    /// Required scopes the app has not been granted.
    fn missing_scopes(
        &self,
        shop: &str,
        access_token: &str,
        required: &[String],
    ) -> impl Future<Output = Result<Vec<String>, ShopifyError>> + Send;

    /// Execute a GraphQL document.
    fn run_query(
        &self,
        shop: &str,
        access_token: &str,
        query: &str,
    ) -> impl Future<Output = Result<Value, ShopifyError>> + Send;
}

impl StoreApi for ShopifyClient {
    async fn missing_scopes(
        &self,
        shop: &str,
        access_token: &str,
        required: &[String],
    ) -> Result<Vec<String>, ShopifyError> {
        Self::missing_scopes(self, shop, access_token, required).await
    }

    async fn run_query(
        &self,
        shop: &str,
        access_token: &str,
        query: &str,
    ) -> Result<Value, ShopifyError> {
        Self::run_query(self, shop, access_token, query, None).await
    }
}

/// A finished exchange ready to be stored.
#[derive(Debug)]
pub struct ExchangeRecord<'r> {
    /// Shop the question was asked about.
    pub shop: &'r ShopDomain,
    /// Token to store, when it came from the request.
    pub new_token: Option<&'r SecretString>,
    /// Conversation named by the request.
    pub conversation_id: Option<ConversationId>,
    /// Title for a new conversation.
    pub title: &'r str,
    /// Question, answer, query and raw result.
    pub exchange: Exchange<'r>,
}

/// Persistence used by the chat flow.
pub trait ChatStore: Clone + Send + Sync + 'static {
    /// Token stored for a shop, if any.
    fn stored_token(
        &self,
        shop: &ShopDomain,
    ) -> impl Future<Output = Result<Option<SecretString>, RepositoryError>> + Send;

    /// Upsert the shop and store the exchange. Returns the conversation used.
    fn save_exchange(
        &self,
        record: ExchangeRecord<'_>,
    ) -> impl Future<Output = Result<ConversationId, RepositoryError>> + Send;
}

/// `PostgreSQL`-backed [`ChatStore`].
#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    /// Create a store over the pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ChatStore for PgChatStore {
    async fn stored_token(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<SecretString>, RepositoryError> {
        let shop = ShopRepository::new(&self.pool)
            .get_by_domain(shop.as_str())
            .await?;
        Ok(shop.map(|s| s.access_token))
    }

    async fn save_exchange(
        &self,
        record: ExchangeRecord<'_>,
    ) -> Result<ConversationId, RepositoryError> {
        let token = record.new_token.map_or(TokenUpdate::Keep, |access_token| {
            TokenUpdate::Replace {
                access_token,
                scope: None,
            }
        });
        let shop = ShopRepository::new(&self.pool)
            .upsert(record.shop, token)
            .await?;

        ConversationRepository::new(&self.pool)
            .record_exchange(
                shop.id,
                record.conversation_id,
                record.title,
                record.exchange,
            )
            .await
    }
}

// =============================================================================
// Request
// =============================================================================

/// Body of `POST /api/chat`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The merchant's question.
    #[serde(default)]
    pub message: Option<String>,
    /// `*.myshopify.com` domain.
    #[serde(default)]
    pub shop_domain: Option<String>,
    /// Explicit access token; overrides and replaces the stored one.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Conversation to append to.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    /// Parse a raw request body.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidBody` if the body is not a JSON object
    /// with string fields.
    pub fn from_slice(body: &[u8]) -> Result<Self, ChatError> {
        serde_json::from_slice(body).map_err(|e| ChatError::InvalidBody(e.to_string()))
    }
}

/// A validated request with its resolved token.
pub struct PreparedChat {
    question: String,
    shop: ShopDomain,
    access_token: SecretString,
    token_from_request: bool,
    conversation_id: Option<ConversationId>,
}

impl std::fmt::Debug for PreparedChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedChat")
            .field("shop", &self.shop)
            .field("token_from_request", &self.token_from_request)
            .field("conversation_id", &self.conversation_id)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Service
// =============================================================================

/// Chat service for answering questions about a shop.
#[derive(Clone)]
pub struct ChatService<M = ClaudeClient, S = ShopifyClient, D = PgChatStore> {
    model: M,
    store_api: S,
    store: D,
    required_scopes: Arc<[String]>,
}

impl<M: LanguageModel, S: StoreApi, D: ChatStore> ChatService<M, S, D> {
    /// Create a new chat service.
    pub fn new(model: M, store_api: S, store: D, required_scopes: &[String]) -> Self {
        Self {
            model,
            store_api,
            store,
            required_scopes: required_scopes.into(),
        }
    }

    /// Validate a request, resolve its access token and check scopes.
    ///
    /// Makes no model or data call unless the message, shop and token are
    /// all present.
    ///
    /// # Errors
    ///
    /// - `MissingMessage` / `MissingShop` / `InvalidShop` for bad input
    /// - `MissingAccessToken` when no token is available
    /// - `MissingScopes` when the app lacks required scopes
    /// - `Shopify` / `Database` when a lookup fails
    #[instrument(skip(self, request))]
    pub async fn prepare(&self, request: ChatRequest) -> Result<PreparedChat, ChatError> {
        let question = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or(ChatError::MissingMessage)?
            .to_string();

        let shop = request
            .shop_domain
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ChatError::MissingShop)?;
        let shop = ShopDomain::parse(shop)?;

        let explicit_token = request
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.to_string()));

        let (access_token, token_from_request) = match explicit_token {
            Some(token) => (token, true),
            None => (
                self.store
                    .stored_token(&shop)
                    .await?
                    .ok_or(ChatError::MissingAccessToken)?,
                false,
            ),
        };

        let missing = self
            .store_api
            .missing_scopes(
                shop.as_str(),
                access_token.expose_secret(),
                &self.required_scopes,
            )
            .await?;
        if !missing.is_empty() {
            warn!(shop = %shop, missing = ?missing, "Shop is missing required scopes");
            return Err(ChatError::MissingScopes(missing));
        }

        let conversation_id = request.conversation_id.as_deref().and_then(|id| {
            id.parse::<ConversationId>()
                .inspect_err(|_| warn!(conversation_id = %id, "Ignoring malformed conversationId"))
                .ok()
        });

        Ok(PreparedChat {
            question,
            shop,
            access_token,
            token_from_request,
            conversation_id,
        })
    }

    /// Run the pipeline for a prepared request, one event per stage.
    ///
    /// The stream ends after an `answer` or a single `error` event.
    pub fn stream(self, chat: PreparedChat) -> impl Stream<Item = ChatStreamEvent> + Send {
        async_stream::stream! {
            yield ChatStreamEvent::status(STATUS_GENERATING);
            let query = match self.generate_query(&chat.question).await {
                Ok(query) => query,
                Err(e) => {
                    yield failure(&chat, &e);
                    return;
                }
            };
            yield ChatStreamEvent::Query { query: query.clone() };

            yield ChatStreamEvent::status(STATUS_CALLING_SHOPIFY);
            let data = match self
                .store_api
                .run_query(chat.shop.as_str(), chat.access_token.expose_secret(), &query)
                .await
            {
                Ok(data) => data,
                Err(e) => {
                    yield failure(&chat, &ChatError::from(e));
                    return;
                }
            };
            yield ChatStreamEvent::data(data.clone());

            yield ChatStreamEvent::status(STATUS_EXPLAINING);
            let answer = match self.explain(&chat.question, &query, &data).await {
                Ok(answer) => answer,
                Err(e) => {
                    yield failure(&chat, &e);
                    return;
                }
            };

            let title = generate_title(&chat.question);
            let record = ExchangeRecord {
                shop: &chat.shop,
                new_token: chat.token_from_request.then_some(&chat.access_token),
                conversation_id: chat.conversation_id,
                title: &title,
                exchange: Exchange {
                    question: &chat.question,
                    answer: &answer,
                    query: &query,
                    data: &data,
                },
            };
            let conversation_id = match self.store.save_exchange(record).await {
                Ok(id) => id,
                Err(e) => {
                    yield failure(&chat, &ChatError::from(e));
                    return;
                }
            };

            info!(shop = %chat.shop, conversation_id = %conversation_id, "Chat answered");
            yield ChatStreamEvent::answer(conversation_id, query, data, answer);
        }
    }

    async fn generate_query(&self, question: &str) -> Result<String, ChatError> {
        let system = SchemaPrompt {
            default_days: DEFAULT_LOOKBACK_DAYS,
            default_limit: DEFAULT_PAGE_SIZE,
        }
        .render()?;
        let user = QueryRequestPrompt { question }.render()?;

        let raw = self.model.complete(&system, &user, QUERY_MAX_TOKENS).await?;
        Ok(sanitize(&raw))
    }

    async fn explain(&self, question: &str, query: &str, data: &Value) -> Result<String, ChatError> {
        let result = serde_json::to_string(data).unwrap_or_else(|_| data.to_string());
        let user = ExplainPrompt {
            question,
            query,
            result: &result,
        }
        .render()?;

        Ok(self
            .model
            .complete(EXPLAIN_SYSTEM_PROMPT, &user, EXPLAIN_MAX_TOKENS)
            .await?)
    }
}

/// Log a pipeline failure and turn it into the terminal event.
fn failure(chat: &PreparedChat, error: &ChatError) -> ChatStreamEvent {
    tracing::error!(shop = %chat.shop, error = %error, "Chat pipeline failed");
    ChatStreamEvent::error(error.public_message())
}

/// Generate a conversation title from the first question.
fn generate_title(message: &str) -> String {
    const MAX_TITLE_CHARS: usize = 50;

    let trimmed = message.trim();
    let Some((cut, _)) = trimmed.char_indices().nth(MAX_TITLE_CHARS) else {
        return trimmed.to_string();
    };

    let truncated = trimmed.get(..cut).unwrap_or(trimmed);
    truncated.rfind(' ').map_or_else(
        || format!("{truncated}..."),
        |space_idx| format!("{}...", truncated.get(..space_idx).unwrap_or(truncated).trim_end()),
    )
}
