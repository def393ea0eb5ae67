//! Proof that the caller may read a shop's stored data.
//!
//! A request is authorized for `?shop=` when either
//! - its session completed the OAuth install for that shop, or
//! - it carries `Authorization: Bearer <token>` matching the shop's stored
//!   offline access token.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use tower_sessions::Session;

use chatbi_core::ShopDomain;

use crate::db::ShopRepository;
use crate::error::AppError;
use crate::state::AppState;

/// Session key listing the shops installed through this session.
const AUTHORIZED_SHOPS_KEY: &str = "authorized_shops";

const UNAUTHORIZED_MESSAGE: &str =
    "Install the app for this shop, or send its access token as a Bearer token";

/// Extractor for routes scoped by `?shop=`.
///
/// Rejects with 400 when `shop` is missing or invalid and with 401 when the
/// caller has no proof of access to it.
#[derive(Debug)]
pub struct ShopAccess(pub ShopDomain);

impl FromRequestParts<AppState> for ShopAccess {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let shop = shop_param(parts.uri.query())
            .and_then(|s| ShopDomain::parse(&s).ok())
            .ok_or_else(|| AppError::BadRequest("Provide a valid shop domain".to_string()))?;

        if let Some(session) = parts.extensions.get::<Session>()
            && session_grants(session, &shop).await
        {
            return Ok(Self(shop));
        }

        let Some(token) = bearer_token(parts) else {
            return Err(AppError::Unauthorized(UNAUTHORIZED_MESSAGE.to_string()));
        };

        let stored = ShopRepository::new(state.pool())
            .get_by_domain(shop.as_str())
            .await?;
        let matches = stored.is_some_and(|s| {
            tokens_match(token, s.access_token.expose_secret(), state.shopify().api_secret())
        });

        if matches {
            Ok(Self(shop))
        } else {
            tracing::warn!(shop = %shop, "Rejected bearer token for shop");
            Err(AppError::Unauthorized(UNAUTHORIZED_MESSAGE.to_string()))
        }
    }
}

/// Record in the session that it installed `shop`.
///
/// # Errors
///
/// Returns the session store error if the session cannot be written.
pub async fn grant_shop_access(
    session: &Session,
    shop: &ShopDomain,
) -> Result<(), tower_sessions::session::Error> {
    let mut shops: Vec<String> = session.get(AUTHORIZED_SHOPS_KEY).await?.unwrap_or_default();
    if !shops.iter().any(|s| s == shop.as_str()) {
        shops.push(shop.to_string());
    }
    session.insert(AUTHORIZED_SHOPS_KEY, shops).await
}

async fn session_grants(session: &Session, shop: &ShopDomain) -> bool {
    match session.get::<Vec<String>>(AUTHORIZED_SHOPS_KEY).await {
        Ok(shops) => shops.is_some_and(|shops| shops.iter().any(|s| s == shop.as_str())),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read session");
            false
        }
    }
}

fn shop_param(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "shop")
        .map(|(_, value)| value.into_owned())
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Constant-time token comparison: both sides are MACed under `key` and the
/// digests compared with `verify_slice`.
fn tokens_match(provided: &str, stored: &str, key: &str) -> bool {
    let mac = |value: &str| {
        Hmac::<Sha256>::new_from_slice(key.as_bytes()).map(|mut mac| {
            mac.update(value.as_bytes());
            mac
        })
    };
    let (Ok(expected), Ok(candidate)) = (mac(stored), mac(provided)) else {
        return false;
    };
    candidate
        .verify_slice(&expected.finalize().into_bytes())
        .is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(uri: &str, authorization: Option<&str>) -> Parts {
        let mut request = Request::get(uri);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        request.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("shpat_abc", "shpat_abc", "app-secret"));
        assert!(!tokens_match("shpat_abd", "shpat_abc", "app-secret"));
        assert!(!tokens_match("", "shpat_abc", "app-secret"));
    }

    #[test]
    fn test_shop_param() {
        assert_eq!(
            shop_param(Some("limit=5&shop=acme.myshopify.com")).as_deref(),
            Some("acme.myshopify.com")
        );
        assert_eq!(shop_param(Some("limit=5")), None);
        assert_eq!(shop_param(None), None);
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(
            bearer_token(&parts("/", Some("Bearer shpat_abc"))),
            Some("shpat_abc")
        );
        assert_eq!(bearer_token(&parts("/", Some("Basic dXNlcg=="))), None);
        assert_eq!(bearer_token(&parts("/", Some("Bearer  "))), None);
        assert_eq!(bearer_token(&parts("/", None)), None);
    }

    #[tokio::test]
    async fn test_no_credentials_is_unauthorized() {
        let mut parts = parts("/api/conversations?shop=acme.myshopify.com", None);
        let rejection = ShopAccess::from_request_parts(&mut parts, &AppState::for_tests())
            .await
            .unwrap_err();
        assert!(matches!(rejection, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_invalid_shop_is_bad_request() {
        let mut parts = parts("/api/conversations?shop=acme.com", Some("Bearer shpat_abc"));
        let rejection = ShopAccess::from_request_parts(&mut parts, &AppState::for_tests())
            .await
            .unwrap_err();
        assert!(matches!(rejection, AppError::BadRequest(_)));
    }
}
