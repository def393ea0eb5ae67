//! Session middleware configuration.
//!
//! Sessions only carry OAuth install state between `/install` and
//! `/callback`, so they are short-lived. The cookie is `SameSite=Lax` because
//! it must survive the top-level redirect back from Shopify.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ChatbiConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "chatbi_session";

/// Session expiry time in seconds (30 minutes of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 30 * 60;

/// Errors that can occur while building the session layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionSetupError {
    /// The store rejected the schema or table name.
    #[error("invalid session store name: {0}")]
    Store(String),

    /// The signing key could not be derived.
    #[error("invalid session signing key: {0}")]
    Key(String),
}

/// Create the session layer with a `PostgreSQL` store and signed cookies.
///
/// The session table lives in the `chatbi` schema and is created by the
/// migrations, not at startup.
///
/// # Errors
///
/// Returns `SessionSetupError` if the store names or signing key are invalid.
pub fn create_session_layer(
    pool: &PgPool,
    config: &ChatbiConfig,
) -> Result<SessionManagerLayer<PostgresStore, SignedCookie>, SessionSetupError> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name("chatbi")
        .map_err(|e| SessionSetupError::Store(e.to_string()))?
        .with_table_name("session")
        .map_err(|e| SessionSetupError::Store(e.to_string()))?;

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(&config.session_secret)?))
}

/// Stretch the configured secret to the 64 bytes a cookie key needs.
fn signing_key(secret: &SecretString) -> Result<Key, SessionSetupError> {
    let digest = Sha512::digest(secret.expose_secret().as_bytes());
    Key::try_from(digest.as_slice()).map_err(|e| SessionSetupError::Key(e.to_string()))
}
