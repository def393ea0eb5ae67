//! Installed shop model.

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use chatbi_core::{ShopDomain, ShopId};

/// A shop that installed the app or was queried with an explicit token.
///
/// Not `Serialize`: the access token must never leave the server.
#[derive(Clone)]
pub struct Shop {
    /// Unique shop ID.
    pub id: ShopId,
    /// `*.myshopify.com` domain.
    pub domain: ShopDomain,
    /// Offline Admin API access token.
    pub access_token: SecretString,
    /// Granted scopes reported at install time.
    pub scope: Option<String>,
    /// When the shop was first seen.
    pub created_at: DateTime<Utc>,
    /// When the shop row was last written.
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Shop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shop")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
