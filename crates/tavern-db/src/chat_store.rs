//! Append-only chat log per lobby.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tavern_types::{ChatMessage, LobbyId};
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `chat_messages` table.
pub struct ChatStore<'a> {
    pool: &'a PgPool,
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    lobby_id: Uuid,
    user_id: Uuid,
    username: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<ChatRow> for ChatMessage {
    fn from(r: ChatRow) -> Self {
        Self {
            lobby_id: r.lobby_id.into(),
            user_id: r.user_id.into(),
            username: r.username,
            message: r.message,
            timestamp: r.created_at,
        }
    }
}

impl<'a> ChatStore<'a> {
    /// Create a new chat store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append one chat line.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn append(&self, message: &ChatMessage) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO chat_messages (lobby_id, user_id, username, message, created_at)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.lobby_id.into_inner())
        .bind(message.user_id.into_inner())
        .bind(&message.username)
        .bind(&message.message)
        .bind(message.timestamp)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// The most recent `limit` lines, returned oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn recent(&self, lobby: LobbyId, limit: usize) -> Result<Vec<ChatMessage>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = sqlx::query_as::<_, ChatRow>(
            r"SELECT lobby_id, user_id, username, message, created_at
              FROM chat_messages
              WHERE lobby_id = $1
              ORDER BY created_at DESC, id DESC
              LIMIT $2",
        )
        .bind(lobby.into_inner())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.reverse();
        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }
}
