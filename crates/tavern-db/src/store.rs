//! The [`Store`] trait: every durable read and write the realtime core needs.
//!
//! Map chunks, map state and character sheets are whole-value blobs. There
//! is no sub-field addressing at this layer, so callers that patch part of
//! a blob must read it, modify it, and write the whole value back.

use std::future::Future;

use tavern_types::{
    Character, CharacterId, ChatMessage, Chunk, ChunkCoord, Lobby, LobbyId, MapState,
    Participant, User, UserId,
};

use crate::error::DbError;

/// Durable record store consumed by the map engine and session gateway.
///
/// Every method is a suspension point and must fail (not hang) when the
/// backing store is unavailable.
pub trait Store: Send + Sync + 'static {
    /// Look up a user by ID.
    fn get_user(&self, id: UserId) -> impl Future<Output = Result<Option<User>, DbError>> + Send;

    /// Look up a lobby by ID.
    fn get_lobby(
        &self,
        id: LobbyId,
    ) -> impl Future<Output = Result<Option<Lobby>, DbError>> + Send;

    /// Look up the membership row for `(lobby, user)`.
    fn get_participant(
        &self,
        lobby: LobbyId,
        user: UserId,
    ) -> impl Future<Output = Result<Option<Participant>, DbError>> + Send;

    /// Set the ban flag on a membership row. Returns `false` if no row exists.
    fn set_participant_banned(
        &self,
        lobby: LobbyId,
        user: UserId,
        banned: bool,
    ) -> impl Future<Output = Result<bool, DbError>> + Send;

    /// Read one chunk grid. Absence is a normal state, not an error.
    fn get_chunk(
        &self,
        lobby: LobbyId,
        coord: ChunkCoord,
    ) -> impl Future<Output = Result<Option<Chunk>, DbError>> + Send;

    /// Write one chunk grid, replacing any previous grid at that coordinate.
    fn put_chunk(
        &self,
        lobby: LobbyId,
        chunk: &Chunk,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Read the lobby's map state blob.
    fn get_map_state(
        &self,
        lobby: LobbyId,
    ) -> impl Future<Output = Result<Option<MapState>, DbError>> + Send;

    /// Write the lobby's map state blob.
    fn put_map_state(
        &self,
        lobby: LobbyId,
        state: &MapState,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Append one chat line.
    fn append_chat(&self, message: &ChatMessage)
    -> impl Future<Output = Result<(), DbError>> + Send;

    /// The most recent `limit` chat lines, oldest first.
    fn recent_chat(
        &self,
        lobby: LobbyId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, DbError>> + Send;

    /// Look up a character sheet.
    fn get_character(
        &self,
        id: CharacterId,
    ) -> impl Future<Output = Result<Option<Character>, DbError>> + Send;
}
