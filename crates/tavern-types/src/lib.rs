//! Shared type definitions for Tavern.
//!
//! This crate is the single source of truth for every record and wire
//! message exchanged between the realtime gateway, the map engine, the
//! storage layer and browser clients. Types flow to `TypeScript` via
//! `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for users, lobbies, characters, connections
//! - [`map`] -- Tiles, chunks, markers and the per-lobby map state blob
//! - [`lobby`] -- Users, lobbies, participants, characters, chat lines
//! - [`events`] -- Inbound [`ClientEvent`] and outbound [`ServerEvent`] frames

pub mod events;
pub mod ids;
pub mod lobby;
pub mod map;

// Re-export all public types at crate root for convenience.
pub use events::{ClientEvent, ServerEvent};
pub use ids::{CharacterId, ConnectionId, LobbyId, UserId};
pub use lobby::{Character, ChatMessage, Lobby, OnlineUser, Participant, User};
pub use map::{
    CHUNK_SIZE, Chunk, ChunkCoord, DEFAULT_MAP_HEIGHT, DEFAULT_MAP_WIDTH, MapGenerationMode,
    MapState, Marker, Tile, TilePatch, TileType,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for client-facing types.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::ids::UserId::export_all();
        let _ = crate::ids::LobbyId::export_all();
        let _ = crate::ids::CharacterId::export_all();

        let _ = crate::map::Tile::export_all();
        let _ = crate::map::TilePatch::export_all();
        let _ = crate::map::Chunk::export_all();
        let _ = crate::map::MapState::export_all();

        let _ = crate::lobby::ChatMessage::export_all();
        let _ = crate::lobby::OnlineUser::export_all();
        let _ = crate::lobby::Character::export_all();

        let _ = crate::events::ClientEvent::export_all();
        let _ = crate::events::ServerEvent::export_all();
    }
}
