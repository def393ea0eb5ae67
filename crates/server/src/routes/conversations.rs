//! Conversation history routes.
//!
//! Every route is scoped by `?shop=` and requires [`ShopAccess`]; a
//! conversation is only visible through the shop it belongs to.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use chatbi_core::{ConversationId, ShopDomain, ShopId};

use crate::db::{ConversationRepository, ShopRepository};
use crate::error::AppError;
use crate::middleware::ShopAccess;
use crate::models::{Conversation, ConversationDetail};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// Build the conversations router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/conversations", get(list_conversations))
        .route(
            "/api/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ConversationList {
    conversations: Vec<Conversation>,
}

/// GET /api/conversations?shop= - Most recent conversations of a shop.
#[instrument(skip(state))]
async fn list_conversations(
    State(state): State<AppState>,
    ShopAccess(shop): ShopAccess,
    Query(params): Query<ListParams>,
) -> Result<Json<ConversationList>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let Some(shop_id) = resolve_shop(&state, &shop).await? else {
        return Ok(Json(ConversationList {
            conversations: Vec::new(),
        }));
    };

    let conversations = ConversationRepository::new(state.pool())
        .list_for_shop(shop_id, limit)
        .await?;

    Ok(Json(ConversationList { conversations }))
}

/// GET /api/conversations/{id}?shop= - Conversation with its messages.
#[instrument(skip(state))]
async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ShopAccess(shop): ShopAccess,
) -> Result<Json<ConversationDetail>, AppError> {
    let id = parse_id(&id)?;
    let shop_id = resolve_shop(&state, &shop)
        .await?
        .ok_or_else(|| AppError::NotFound("conversation".to_string()))?;

    let detail = ConversationRepository::new(state.pool())
        .get_detail(id, shop_id)
        .await?;

    Ok(Json(detail))
}

/// DELETE /api/conversations/{id}?shop= - Delete a conversation.
#[instrument(skip(state))]
async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ShopAccess(shop): ShopAccess,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    let shop_id = resolve_shop(&state, &shop)
        .await?
        .ok_or_else(|| AppError::NotFound("conversation".to_string()))?;

    ConversationRepository::new(state.pool())
        .delete(id, shop_id)
        .await?;

    tracing::info!(conversation_id = %id, "Conversation deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn parse_id(id: &str) -> Result<ConversationId, AppError> {
    id.parse()
        .map_err(|_| AppError::BadRequest("Invalid conversation id".to_string()))
}

/// Look the shop up. `None` when it was never seen.
async fn resolve_shop(state: &AppState, shop: &ShopDomain) -> Result<Option<ShopId>, AppError> {
    let shop = ShopRepository::new(state.pool())
        .get_by_domain(shop.as_str())
        .await?;

    Ok(shop.map(|s| s.id))
}
