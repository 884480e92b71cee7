//! Chunk grids and map state blobs, stored as `JSONB`.
//!
//! A chunk row holds the entire grid. Grids that no longer decode as
//! tiles are reported as absent so the map engine regenerates them.

use sqlx::PgPool;
use sqlx::types::Json;
use tavern_types::{Chunk, ChunkCoord, LobbyId, MapState, Tile};

use crate::error::DbError;

/// Operations on `map_chunks` and `map_states`.
pub struct MapStore<'a> {
    pool: &'a PgPool,
}

impl<'a> MapStore<'a> {
    /// Create a new map store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Read one chunk grid.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_chunk(
        &self,
        lobby: LobbyId,
        coord: ChunkCoord,
    ) -> Result<Option<Chunk>, DbError> {
        let raw: Option<serde_json::Value> = sqlx::query_scalar(
            r"SELECT tiles FROM map_chunks
              WHERE lobby_id = $1 AND chunk_x = $2 AND chunk_y = $3",
        )
        .bind(lobby.into_inner())
        .bind(coord.chunk_x)
        .bind(coord.chunk_y)
        .fetch_optional(self.pool)
        .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_value::<Vec<Vec<Tile>>>(raw) {
            Ok(tiles) => Ok(Some(Chunk {
                chunk_x: coord.chunk_x,
                chunk_y: coord.chunk_y,
                tiles,
            })),
            Err(e) => {
                tracing::warn!(%lobby, %coord, error = %e, "undecodable chunk grid, treating as absent");
                Ok(None)
            }
        }
    }

    /// Upsert one chunk grid.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the write fails.
    pub async fn put_chunk(&self, lobby: LobbyId, chunk: &Chunk) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO map_chunks (lobby_id, chunk_x, chunk_y, tiles)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (lobby_id, chunk_x, chunk_y) DO UPDATE SET
                tiles = EXCLUDED.tiles,
                updated_at = now()",
        )
        .bind(lobby.into_inner())
        .bind(chunk.chunk_x)
        .bind(chunk.chunk_y)
        .bind(Json(&chunk.tiles))
        .execute(self.pool)
        .await?;

        tracing::debug!(%lobby, coord = %chunk.coord(), "Stored chunk");
        Ok(())
    }

    /// Read the lobby's map state.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::Serialization`] if the stored blob is not a map state.
    pub async fn get_map_state(&self, lobby: LobbyId) -> Result<Option<MapState>, DbError> {
        let raw: Option<serde_json::Value> =
            sqlx::query_scalar(r"SELECT map_data FROM map_states WHERE lobby_id = $1")
                .bind(lobby.into_inner())
                .fetch_optional(self.pool)
                .await?;
        raw.map(serde_json::from_value)
            .transpose()
            .map_err(DbError::from)
    }

    /// Upsert the lobby's map state.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the write fails.
    pub async fn put_map_state(&self, lobby: LobbyId, state: &MapState) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO map_states (lobby_id, map_data)
              VALUES ($1, $2)
              ON CONFLICT (lobby_id) DO UPDATE SET
                map_data = EXCLUDED.map_data,
                updated_at = now()",
        )
        .bind(lobby.into_inner())
        .bind(Json(state))
        .execute(self.pool)
        .await?;

        tracing::debug!(%lobby, markers = state.markers.len(), "Stored map state");
        Ok(())
    }
}
