//! Reads against the lobby service's tables: users, lobbies, participants,
//! characters. The only write is the participant ban flag.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tavern_types::{
    Character, CharacterId, Lobby, LobbyId, MapGenerationMode, Participant, User, UserId,
};
use uuid::Uuid;

use crate::error::DbError;

/// Operations on `users`, `lobbies`, `lobby_participants`, `characters`.
pub struct LobbyStore<'a> {
    pool: &'a PgPool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
}

#[derive(sqlx::FromRow)]
struct LobbyRow {
    id: Uuid,
    name: String,
    gm_id: Uuid,
    map_mode: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    lobby_id: Uuid,
    user_id: Uuid,
    joined_at: DateTime<Utc>,
    is_banned: bool,
    character_id: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct CharacterRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    data: serde_json::Value,
}

impl<'a> LobbyStore<'a> {
    /// Create a new lobby store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a user by ID.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, DbError> {
        let row = sqlx::query_as::<_, UserRow>(r"SELECT id, username FROM users WHERE id = $1")
            .bind(id.into_inner())
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(|r| User {
            id: r.id.into(),
            username: r.username,
        }))
    }

    /// Look up a lobby by ID. Unknown `map_mode` strings fall back to `empty`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_lobby(&self, id: LobbyId) -> Result<Option<Lobby>, DbError> {
        let row = sqlx::query_as::<_, LobbyRow>(
            r"SELECT id, name, gm_id, map_mode, is_active, created_at
              FROM lobbies
              WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| {
            let map_mode = MapGenerationMode::parse(&r.map_mode).unwrap_or_else(|| {
                tracing::warn!(lobby_id = %r.id, map_mode = %r.map_mode, "unknown map mode, using empty");
                MapGenerationMode::Empty
            });
            Lobby {
                id: r.id.into(),
                name: r.name,
                gm_id: r.gm_id.into(),
                map_mode,
                is_active: r.is_active,
                created_at: r.created_at,
            }
        }))
    }

    /// Look up the membership row for `(lobby, user)`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_participant(
        &self,
        lobby: LobbyId,
        user: UserId,
    ) -> Result<Option<Participant>, DbError> {
        let row = sqlx::query_as::<_, ParticipantRow>(
            r"SELECT lobby_id, user_id, joined_at, is_banned, character_id
              FROM lobby_participants
              WHERE lobby_id = $1 AND user_id = $2",
        )
        .bind(lobby.into_inner())
        .bind(user.into_inner())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| Participant {
            lobby_id: r.lobby_id.into(),
            user_id: r.user_id.into(),
            joined_at: r.joined_at,
            is_banned: r.is_banned,
            character_id: r.character_id.map(CharacterId::from),
        }))
    }

    /// Set the ban flag. Returns `false` if the row does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn set_banned(
        &self,
        lobby: LobbyId,
        user: UserId,
        banned: bool,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"UPDATE lobby_participants SET is_banned = $3
              WHERE lobby_id = $1 AND user_id = $2",
        )
        .bind(lobby.into_inner())
        .bind(user.into_inner())
        .bind(banned)
        .execute(self.pool)
        .await?;

        tracing::debug!(%lobby, %user, banned, "Updated participant ban flag");
        Ok(result.rows_affected() > 0)
    }

    /// Look up a character sheet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_character(&self, id: CharacterId) -> Result<Option<Character>, DbError> {
        let row = sqlx::query_as::<_, CharacterRow>(
            r"SELECT id, user_id, name, data FROM characters WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| Character {
            id: r.id.into(),
            user_id: r.user_id.into(),
            name: r.name,
            data: r.data,
        }))
    }
}
