//! Shopify OAuth install routes.
//!
//! `install` stores a random state (and the shop it was issued for) in the
//! session and redirects to Shopify's consent screen. `callback` checks that
//! state, verifies Shopify's HMAC signature, exchanges the code for an
//! offline token and stores it. The session is then allowed to read that
//! shop's conversation history.

use axum::{
    Router,
    extract::{Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use chatbi_core::ShopDomain;

use crate::db::ShopRepository;
use crate::db::shops::TokenUpdate;
use crate::error::AppError;
use crate::middleware::grant_shop_access;
use crate::shopify::{ShopifyError, hmac};
use crate::state::AppState;

const OAUTH_STATE_KEY: &str = "shopify_oauth_state";

/// What the install step leaves in the session for the callback.
#[derive(Debug, Serialize, Deserialize)]
struct PendingInstall {
    state: String,
    shop: String,
    redirect: Option<String>,
}

/// Build the OAuth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/shopify/install", get(install))
        .route("/api/auth/shopify/callback", get(callback))
}

#[derive(Debug, Deserialize)]
struct InstallParams {
    shop: Option<String>,
    redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    shop: Option<String>,
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /api/auth/shopify/install?shop= - Start OAuth.
#[instrument(skip(state, session))]
async fn install(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<InstallParams>,
) -> Result<Response, AppError> {
    let shop = ShopDomain::parse(params.shop.as_deref().unwrap_or_default()).map_err(|_| {
        AppError::BadRequest(
            "Provide a valid shop domain, e.g. mystore.myshopify.com".to_string(),
        )
    })?;

    let oauth_state = uuid::Uuid::new_v4().to_string();
    let pending = PendingInstall {
        state: oauth_state.clone(),
        shop: shop.to_string(),
        redirect: params.redirect.as_deref().and_then(safe_redirect).map(String::from),
    };
    session
        .insert(OAUTH_STATE_KEY, &pending)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store OAuth state: {e}")))?;

    let config = state.config();
    let auth_url = state.shopify().authorization_url(
        &shop,
        &config.oauth_redirect_uri(),
        &config.shopify.scopes,
        &oauth_state,
    )?;

    tracing::info!(shop = %shop, "Redirecting to Shopify OAuth");
    Ok(Redirect::to(&auth_url).into_response())
}

/// GET /api/auth/shopify/callback - Finish OAuth.
#[instrument(skip(state, session, params, raw_query))]
async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<CallbackParams>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, AppError> {
    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or_default();
        tracing::warn!(error = %error, description = %description, "Shopify OAuth was not completed");
        return Err(AppError::BadRequest("Authorization was denied".to_string()));
    }

    let shop = ShopDomain::parse(params.shop.as_deref().unwrap_or_default())
        .map_err(|_| AppError::BadRequest("Invalid shop parameter".to_string()))?;

    let pending: PendingInstall = session
        .get(OAUTH_STATE_KEY)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read OAuth state: {e}")))?
        .ok_or_else(|| AppError::BadRequest("Missing OAuth state".to_string()))?;

    if params.state.as_deref() != Some(pending.state.as_str()) || pending.shop != shop.as_str() {
        tracing::warn!(shop = %shop, "OAuth state mismatch");
        return Err(AppError::BadRequest("OAuth state mismatch".to_string()));
    }

    if !hmac::verify_query(raw_query.as_deref().unwrap_or_default(), state.shopify().api_secret()) {
        tracing::warn!(shop = %shop, "Invalid HMAC signature in OAuth callback");
        return Err(AppError::BadRequest("HMAC verification failed".to_string()));
    }

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return Err(AppError::BadRequest("Missing code".to_string()));
    };

    let token = state
        .shopify()
        .exchange_code(&shop, code)
        .await
        .map_err(|e| match e {
            ShopifyError::OAuth(message) => {
                AppError::BadRequest(format!("Failed to obtain access_token: {message}"))
            }
            other => AppError::Shopify(other),
        })?;

    ShopRepository::new(state.pool())
        .upsert(
            &shop,
            TokenUpdate::Replace {
                access_token: &token.access_token,
                scope: token.scope.as_deref(),
            },
        )
        .await?;

    if let Err(e) = session.remove::<PendingInstall>(OAUTH_STATE_KEY).await {
        tracing::warn!(error = %e, "Failed to clear OAuth state");
    }
    if let Err(e) = grant_shop_access(&session, &shop).await {
        tracing::warn!(shop = %shop, error = %e, "Failed to record shop access in session");
    }

    tracing::info!(shop = %shop, scope = ?token.scope, "Shop installed");
    Ok(Redirect::to(&installed_location(pending.redirect.as_deref(), &shop)).into_response())
}

/// Accept only same-site absolute paths.
fn safe_redirect(redirect: &str) -> Option<&str> {
    let valid = redirect.starts_with('/')
        && !redirect.starts_with("//")
        && !redirect.starts_with("/\\")
        && !redirect.chars().any(char::is_control);
    valid.then_some(redirect)
}

fn installed_location(redirect: Option<&str>, shop: &ShopDomain) -> String {
    let base = redirect.and_then(safe_redirect).unwrap_or("/");
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}installed=1&shop={shop}")
}
