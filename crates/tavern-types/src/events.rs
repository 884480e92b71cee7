//! Realtime wire protocol.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<snake_case name>", "data": {...}}`. Inbound events all
//! carry the caller's identity token and the target lobby; outbound events
//! carry only their payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{CharacterId, LobbyId, UserId};
use crate::lobby::{ChatMessage, OnlineUser};
use crate::map::{Chunk, MapState, Marker, Tile, TilePatch};

/// An event sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClientEvent {
    /// Join the lobby's realtime channel.
    Authenticate {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
    },
    /// Post a chat line (or a `/roll` command).
    SendMessage {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
        /// Raw text as typed.
        message: String,
    },
    /// Roll a skill check for a character.
    RollSkill {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
        /// The character whose sheet supplies the bonus.
        character_id: CharacterId,
        /// Skill key to look up.
        skill_name: String,
        /// Situational modifier added on top of the skill bonus.
        #[serde(default)]
        extra_modifier: i64,
    },
    /// Fetch (and lazily generate) every chunk in a closed rectangle.
    RequestChunks {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
        /// Smallest chunk x, inclusive.
        min_x: i32,
        /// Largest chunk x, inclusive.
        max_x: i32,
        /// Smallest chunk y, inclusive.
        min_y: i32,
        /// Largest chunk y, inclusive.
        max_y: i32,
    },
    /// GM-only: overwrite fields of one tile.
    UpdateTile {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
        /// Chunk x.
        chunk_x: i32,
        /// Chunk y.
        chunk_y: i32,
        /// Tile column inside the chunk.
        tile_x: i64,
        /// Tile row inside the chunk.
        tile_y: i64,
        /// Fields to overwrite.
        updates: TilePatch,
    },
    /// Fetch the lobby's marker list.
    GetMapState {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
    },
    /// Place a marker.
    AddMarker {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
        /// Horizontal position.
        x: f64,
        /// Vertical position.
        y: f64,
        /// Marker kind.
        #[serde(rename = "type")]
        marker_type: String,
    },
    /// Move a marker.
    MoveMarker {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
        /// Marker to move.
        marker_id: u64,
        /// New horizontal position.
        x: f64,
        /// New vertical position.
        y: f64,
    },
    /// Delete a marker.
    DeleteMarker {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
        /// Marker to delete.
        marker_id: u64,
    },
    /// GM-only: ban a participant and kick their connections.
    BanUser {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
        /// User to ban.
        user_id: UserId,
        /// Reason shown to the banned user.
        #[serde(default)]
        reason: Option<String>,
    },
    /// GM-only: lift a ban.
    UnbanUser {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
        /// User to unban.
        user_id: UserId,
    },
    /// Leave the lobby's channel without closing the connection.
    LeaveLobby {
        /// Identity token.
        token: String,
        /// Target lobby.
        lobby_id: LobbyId,
    },
}

impl ClientEvent {
    /// The identity token carried by the event.
    pub fn token(&self) -> &str {
        match self {
            Self::Authenticate { token, .. }
            | Self::SendMessage { token, .. }
            | Self::RollSkill { token, .. }
            | Self::RequestChunks { token, .. }
            | Self::UpdateTile { token, .. }
            | Self::GetMapState { token, .. }
            | Self::AddMarker { token, .. }
            | Self::MoveMarker { token, .. }
            | Self::DeleteMarker { token, .. }
            | Self::BanUser { token, .. }
            | Self::UnbanUser { token, .. }
            | Self::LeaveLobby { token, .. } => token,
        }
    }

    /// The lobby the event targets.
    pub const fn lobby_id(&self) -> LobbyId {
        match self {
            Self::Authenticate { lobby_id, .. }
            | Self::SendMessage { lobby_id, .. }
            | Self::RollSkill { lobby_id, .. }
            | Self::RequestChunks { lobby_id, .. }
            | Self::UpdateTile { lobby_id, .. }
            | Self::GetMapState { lobby_id, .. }
            | Self::AddMarker { lobby_id, .. }
            | Self::MoveMarker { lobby_id, .. }
            | Self::DeleteMarker { lobby_id, .. }
            | Self::BanUser { lobby_id, .. }
            | Self::UnbanUser { lobby_id, .. }
            | Self::LeaveLobby { lobby_id, .. } => *lobby_id,
        }
    }

    /// Wire name of the event, for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::SendMessage { .. } => "send_message",
            Self::RollSkill { .. } => "roll_skill",
            Self::RequestChunks { .. } => "request_chunks",
            Self::UpdateTile { .. } => "update_tile",
            Self::GetMapState { .. } => "get_map_state",
            Self::AddMarker { .. } => "add_marker",
            Self::MoveMarker { .. } => "move_marker",
            Self::DeleteMarker { .. } => "delete_marker",
            Self::BanUser { .. } => "ban_user",
            Self::UnbanUser { .. } => "unban_user",
            Self::LeaveLobby { .. } => "leave_lobby",
        }
    }
}

/// An event pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ServerEvent {
    /// Unicast: the connection joined the lobby.
    Authenticated {
        /// Caller's display name.
        username: String,
    },
    /// Broadcast: someone joined.
    UserJoined {
        /// Joining user.
        user_id: UserId,
        /// Their display name.
        username: String,
    },
    /// Broadcast: someone left or disconnected.
    UserLeft {
        /// Leaving user.
        user_id: UserId,
    },
    /// Unicast: users currently present in the lobby.
    OnlineUsers {
        /// Present users.
        users: Vec<OnlineUser>,
    },
    /// Unicast: recent chat, oldest first.
    ChatHistory {
        /// Recent lines.
        messages: Vec<ChatMessage>,
    },
    /// Chat line (broadcast, or unicast for private system notices).
    NewMessage {
        /// Sender name.
        username: String,
        /// Text.
        message: String,
        /// Server time.
        timestamp: DateTime<Utc>,
    },
    /// Unicast: requested chunks.
    Chunks {
        /// One entry per requested coordinate, in no particular order.
        chunks: Vec<Chunk>,
    },
    /// Broadcast: one tile changed.
    TileUpdated {
        /// Chunk x.
        chunk_x: i32,
        /// Chunk y.
        chunk_y: i32,
        /// Tile column.
        tile_x: u32,
        /// Tile row.
        tile_y: u32,
        /// The tile after the update.
        tile: Tile,
    },
    /// Unicast: full marker state.
    MapState(MapState),
    /// Broadcast: marker created.
    MarkerAdded {
        /// The new marker.
        marker: Marker,
    },
    /// Broadcast: marker moved (possibly a no-op).
    MarkerMoved {
        /// Marker id.
        marker_id: u64,
        /// New horizontal position.
        x: f64,
        /// New vertical position.
        y: f64,
    },
    /// Broadcast: marker deleted (possibly a no-op).
    MarkerDeleted {
        /// Marker id.
        marker_id: u64,
    },
    /// Broadcast: a participant was banned.
    UserBanned {
        /// Banned user.
        user_id: UserId,
    },
    /// Broadcast: a ban was lifted.
    UserUnbanned {
        /// Unbanned user.
        user_id: UserId,
    },
    /// Unicast to each connection of a banned user.
    Kicked {
        /// Reason given by the GM.
        reason: String,
    },
    /// Unicast: the caller's action failed.
    Error {
        /// Stable machine-readable code.
        code: String,
        /// Human-readable description.
        message: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn client_event_uses_event_and_data_keys() {
        let lobby_id = LobbyId::new();
        let raw = serde_json::json!({
            "event": "send_message",
            "data": { "token": "t", "lobby_id": lobby_id, "message": "hi" }
        });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.name(), "send_message");
        assert_eq!(event.token(), "t");
        assert_eq!(event.lobby_id(), lobby_id);
    }

    #[test]
    fn roll_skill_modifier_defaults_to_zero() {
        let raw = serde_json::json!({
            "event": "roll_skill",
            "data": {
                "token": "t",
                "lobby_id": LobbyId::new(),
                "character_id": CharacterId::new(),
                "skill_name": "Stealth"
            }
        });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        assert!(matches!(event, ClientEvent::RollSkill { extra_modifier: 0, .. }));
    }

    #[test]
    fn update_tile_accepts_partial_updates() {
        let raw = serde_json::json!({
            "event": "update_tile",
            "data": {
                "token": "t",
                "lobby_id": LobbyId::new(),
                "chunk_x": -1,
                "chunk_y": 2,
                "tile_x": 3,
                "tile_y": 4,
                "updates": { "color": "#fff" }
            }
        });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        let ClientEvent::UpdateTile { updates, .. } = event else {
            panic!("expected update_tile");
        };
        assert_eq!(updates.color.as_deref(), Some("#fff"));
        assert!(updates.tile_type.is_none());
        assert!(updates.height.is_none());
    }

    #[test]
    fn server_event_wire_shape() {
        let json = serde_json::to_value(ServerEvent::UserLeft {
            user_id: UserId::new(),
        })
        .unwrap();
        assert_eq!(json["event"], "user_left");
        assert!(json["data"]["user_id"].is_string());

        let json = serde_json::to_value(ServerEvent::MapState(MapState::default())).unwrap();
        assert_eq!(json["event"], "map_state");
        assert_eq!(json["data"]["width"], 10);
    }

    #[test]
    fn unknown_event_is_rejected() {
        let raw = serde_json::json!({ "event": "teleport", "data": {} });
        assert!(serde_json::from_value::<ClientEvent>(raw).is_err());
    }
}
