//! Error types for the session layer.
//!
//! Every [`SessionError`] is scoped to the connection that triggered it
//! and is reported to that connection only, as an `error{code, message}`
//! frame.

use tavern_db::DbError;
use tavern_map::MapError;
use tavern_rules::RulesError;
use tavern_types::ServerEvent;

/// Errors produced while handling a realtime event.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The identity token is malformed, expired or names an unknown user.
    #[error("Invalid token")]
    InvalidToken,

    /// The caller is not a participant of (or not present in) the lobby.
    #[error("You are not in this lobby")]
    NotInLobby,

    /// The caller is banned from the lobby.
    #[error("You are banned from this lobby")]
    Banned,

    /// The action requires the GM, or ownership the caller lacks.
    #[error("{0}")]
    Forbidden(&'static str),

    /// A ban or unban named the lobby's own GM.
    #[error("The game master cannot be targeted")]
    CannotTargetGm,

    /// The lobby record does not exist.
    #[error("Lobby not found")]
    LobbyNotFound,

    /// The character record does not exist.
    #[error("Character not found")]
    CharacterNotFound,

    /// Tile indices or a chunk range are outside the allowed bounds.
    #[error("{0}")]
    OutOfRange(String),

    /// A dice expression failed to evaluate.
    #[error("{0}")]
    MalformedExpression(String),

    /// No numeric bonus for the skill exists on the character sheet.
    #[error("Skill {0} not found")]
    SkillNotFound(String),

    /// A store read or commit failed. Details are logged, not sent.
    #[error("Storage error")]
    Storage(#[from] DbError),
}

impl SessionError {
    /// Stable machine-readable code sent to clients.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid_token",
            Self::NotInLobby => "not_in_lobby",
            Self::Banned => "banned",
            Self::Forbidden(_) => "forbidden",
            Self::CannotTargetGm => "cannot_target_gm",
            Self::LobbyNotFound => "lobby_not_found",
            Self::CharacterNotFound => "character_not_found",
            Self::OutOfRange(_) => "out_of_range",
            Self::MalformedExpression(_) => "malformed_expression",
            Self::SkillNotFound(_) => "skill_not_found",
            Self::Storage(_) => "storage_error",
        }
    }

    /// The `error` frame reporting this failure.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error {
            code: self.code().to_owned(),
            message: self.to_string(),
        }
    }
}

impl From<MapError> for SessionError {
    fn from(e: MapError) -> Self {
        match e {
            MapError::Storage(db) => Self::Storage(db),
            out_of_range @ (MapError::TileOutOfRange { .. } | MapError::RangeTooLarge { .. }) => {
                Self::OutOfRange(out_of_range.to_string())
            }
        }
    }
}

impl From<RulesError> for SessionError {
    fn from(e: RulesError) -> Self {
        match e {
            RulesError::SkillNotFound(skill) => Self::SkillNotFound(skill),
            other => Self::MalformedExpression(other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn map_errors_keep_their_category() {
        let e = SessionError::from(MapError::TileOutOfRange {
            tile_x: 32,
            tile_y: 0,
        });
        assert_eq!(e.code(), "out_of_range");

        let e = SessionError::from(MapError::Storage(DbError::Unavailable(String::from("down"))));
        assert_eq!(e.code(), "storage_error");
        assert_eq!(e.to_string(), "Storage error");
    }

    #[test]
    fn skill_errors_name_the_skill() {
        let e = SessionError::from(RulesError::SkillNotFound(String::from("Stealth")));
        let ServerEvent::Error { code, message } = e.to_event() else {
            panic!("expected error frame");
        };
        assert_eq!(code, "skill_not_found");
        assert_eq!(message, "Skill Stealth not found");
    }
}
