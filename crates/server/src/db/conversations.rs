//! Database operations for conversations and their messages.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use chatbi_core::{ConversationId, MessageId, MessageRole, ShopId};

use super::RepositoryError;
use crate::models::{Conversation, ConversationDetail, Message};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    shop_id: i32,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: ConversationId::from_uuid(row.id),
            shop_id: ShopId::new(row.shop_id),
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i32,
    conversation_id: Uuid,
    role: MessageRole,
    content: String,
    query: Option<String>,
    data: Option<Value>,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: MessageId::new(row.id),
            conversation_id: ConversationId::from_uuid(row.conversation_id),
            role: row.role,
            content: row.content,
            query: row.query,
            data: row.data,
            created_at: row.created_at,
        }
    }
}

/// One completed question/answer pair.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'e> {
    /// The merchant's question.
    pub question: &'e str,
    /// The generated answer.
    pub answer: &'e str,
    /// The executed query.
    pub query: &'e str,
    /// The raw query result.
    pub data: &'e Value,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for conversation database operations.
pub struct ConversationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ConversationRepository<'a> {
    /// Create a new conversation repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a conversation if it belongs to the shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_shop(
        &self,
        id: ConversationId,
        shop_id: ShopId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r"
            SELECT id, shop_id, title, created_at, updated_at
            FROM chatbi.conversation
            WHERE id = $1 AND shop_id = $2
            ",
        )
        .bind(id.as_uuid())
        .bind(shop_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List a shop's conversations, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_shop(
        &self,
        shop_id: ShopId,
        limit: i64,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r"
            SELECT id, shop_id, title, created_at, updated_at
            FROM chatbi.conversation
            WHERE shop_id = $1
            ORDER BY updated_at DESC
            LIMIT $2
            ",
        )
        .bind(shop_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a conversation of the shop with all of its messages.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the conversation does not exist
    /// or belongs to another shop.
    pub async fn get_detail(
        &self,
        id: ConversationId,
        shop_id: ShopId,
    ) -> Result<ConversationDetail, RepositoryError> {
        let conversation = self
            .get_for_shop(id, shop_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let rows = sqlx::query_as::<_, MessageRow>(
            r"
            SELECT id, conversation_id, role, content, query, data, created_at
            FROM chatbi.message
            WHERE conversation_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(id.as_uuid())
        .fetch_all(self.pool)
        .await?;

        Ok(ConversationDetail {
            conversation,
            messages: rows.into_iter().map(Into::into).collect(),
        })
    }

    /// Store a question and its answer.
    ///
    /// Appends to `existing` when it names a conversation of the shop,
    /// otherwise creates a new conversation titled `title`. Both messages
    /// are written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails.
    pub async fn record_exchange(
        &self,
        shop_id: ShopId,
        existing: Option<ConversationId>,
        title: &str,
        exchange: Exchange<'_>,
    ) -> Result<ConversationId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let appended: Option<Uuid> = match existing {
            Some(id) => {
                sqlx::query_scalar(
                    r"
                    UPDATE chatbi.conversation
                    SET updated_at = now()
                    WHERE id = $1 AND shop_id = $2
                    RETURNING id
                    ",
                )
                .bind(id.as_uuid())
                .bind(shop_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            None => None,
        };

        let conversation_id = match appended {
            Some(id) => id,
            None => {
                sqlx::query_scalar(
                    r"
                    INSERT INTO chatbi.conversation (id, shop_id, title)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    ",
                )
                .bind(ConversationId::generate().as_uuid())
                .bind(shop_id)
                .bind(title)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        sqlx::query(
            r"
            INSERT INTO chatbi.message (conversation_id, role, content, query, data)
            VALUES ($1, $2, $3, NULL, NULL), ($1, $4, $5, $6, $7)
            ",
        )
        .bind(conversation_id)
        .bind(MessageRole::User)
        .bind(exchange.question)
        .bind(MessageRole::Assistant)
        .bind(exchange.answer)
        .bind(exchange.query)
        .bind(exchange.data)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ConversationId::from_uuid(conversation_id))
    }

    /// Delete a conversation of the shop and its messages.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if nothing was deleted.
    pub async fn delete(
        &self,
        id: ConversationId,
        shop_id: ShopId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM chatbi.conversation
            WHERE id = $1 AND shop_id = $2
            ",
        )
        .bind(id.as_uuid())
        .bind(shop_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
