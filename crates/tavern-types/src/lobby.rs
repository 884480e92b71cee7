//! Lobby-side records: users, lobbies, participants, characters, chat.
//!
//! These rows are owned by the external request/response service; the
//! realtime core reads them (and flips the ban flag) but never creates
//! users, lobbies or characters itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{CharacterId, LobbyId, UserId};
use crate::map::MapGenerationMode;

/// A registered user, as far as the realtime core needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub username: String,
}

/// One game session with exactly one game master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Lobby {
    /// Lobby ID.
    pub id: LobbyId,
    /// Human-readable name.
    pub name: String,
    /// The game master.
    pub gm_id: UserId,
    /// Chunk generation policy, fixed at creation.
    pub map_mode: MapGenerationMode,
    /// `false` once the GM has soft-deleted the lobby.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Lobby {
    /// Whether `user` is this lobby's game master.
    pub fn is_gm(&self, user: UserId) -> bool {
        self.gm_id == user
    }
}

/// Membership row for `(lobby, user)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Participant {
    /// The lobby.
    pub lobby_id: LobbyId,
    /// The member.
    pub user_id: UserId,
    /// When the user joined.
    pub joined_at: DateTime<Utc>,
    /// Banned rows are kept for audit and unban but fail every realtime gate.
    pub is_banned: bool,
    /// Character selected for this lobby, if any.
    pub character_id: Option<CharacterId>,
}

/// A character sheet. `data` has no fixed schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Character {
    /// Character ID.
    pub id: CharacterId,
    /// Owning user.
    pub user_id: UserId,
    /// Character name.
    pub name: String,
    /// Free-form sheet.
    pub data: serde_json::Value,
}

/// One persisted chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChatMessage {
    /// The lobby the line belongs to.
    pub lobby_id: LobbyId,
    /// The user who caused the line (the roller for system roll lines).
    pub user_id: UserId,
    /// Name shown as sender.
    pub username: String,
    /// Message text as broadcast.
    pub message: String,
    /// Server receive time.
    pub timestamp: DateTime<Utc>,
}

/// A user currently present in a lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OnlineUser {
    /// User ID.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
}
