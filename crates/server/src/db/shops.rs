//! Database operations for installed shops.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use chatbi_core::{ShopDomain, ShopId};

use super::RepositoryError;
use crate::models::Shop;

/// Internal row type for shop queries.
#[derive(Debug, sqlx::FromRow)]
struct ShopRow {
    id: i32,
    domain: String,
    access_token: String,
    scope: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShopRow> for Shop {
    type Error = RepositoryError;

    fn try_from(row: ShopRow) -> Result<Self, Self::Error> {
        let domain = ShopDomain::parse(&row.domain)
            .map_err(|e| RepositoryError::DataCorruption(format!("shop {}: {e}", row.id)))?;

        Ok(Self {
            id: ShopId::new(row.id),
            domain,
            access_token: SecretString::from(row.access_token),
            scope: row.scope,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// What to write when a shop is upserted.
#[derive(Debug, Clone, Copy)]
pub enum TokenUpdate<'t> {
    /// Store this token (and scope, when known), replacing any previous one.
    Replace {
        /// New access token.
        access_token: &'t SecretString,
        /// Granted scopes, if reported.
        scope: Option<&'t str>,
    },
    /// Keep the stored token. The shop must already exist.
    Keep,
}

/// Repository for shop database operations.
pub struct ShopRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShopRepository<'a> {
    /// Create a new shop repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a shop by domain.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_domain(&self, domain: &str) -> Result<Option<Shop>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopRow>(
            r"
            SELECT id, domain, access_token, scope, created_at, updated_at
            FROM chatbi.shop
            WHERE domain = $1
            ",
        )
        .bind(domain)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Insert or update a shop.
    ///
    /// With [`TokenUpdate::Keep`] only `updated_at` is touched, and a shop
    /// that does not exist yet yields `RepositoryError::NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        domain: &ShopDomain,
        token: TokenUpdate<'_>,
    ) -> Result<Shop, RepositoryError> {
        let row = match token {
            TokenUpdate::Replace {
                access_token,
                scope,
            } => {
                sqlx::query_as::<_, ShopRow>(
                    r"
                    INSERT INTO chatbi.shop (domain, access_token, scope)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (domain) DO UPDATE
                    SET access_token = EXCLUDED.access_token,
                        scope = COALESCE(EXCLUDED.scope, chatbi.shop.scope),
                        updated_at = now()
                    RETURNING id, domain, access_token, scope, created_at, updated_at
                    ",
                )
                .bind(domain.as_str())
                .bind(access_token.expose_secret())
                .bind(scope)
                .fetch_one(self.pool)
                .await?
            }
            TokenUpdate::Keep => sqlx::query_as::<_, ShopRow>(
                r"
                UPDATE chatbi.shop
                SET updated_at = now()
                WHERE domain = $1
                RETURNING id, domain, access_token, scope, created_at, updated_at
                ",
            )
            .bind(domain.as_str())
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?,
        };

        row.try_into()
    }
}
