//! Realtime event dispatcher.
//!
//! The transport calls [`Gateway::connect`] once per socket, feeds every
//! decoded frame to [`Gateway::handle`], and calls
//! [`Gateway::disconnect`] when the socket closes. Outbound frames are
//! delivered through the connection's [`Outbox`].
//!
//! Every event other than `authenticate` passes the presence gate
//! ([`PresenceTracker::authorize`]). Mutations are committed to the store
//! before anything is broadcast; a failed commit is reported to the caller
//! alone and nothing is broadcast.
//!
//! Joins, bans and unbans on one lobby are serialized, so a ban can never
//! land between a join's participant check and its room entry.

use std::sync::Arc;

use chrono::Utc;
use tavern_db::Store;
use tavern_map::{ChunkRange, ChunkStore, KeyedLocks, MarkerBoard};
use tavern_rules::roll_skill_check;
use tavern_types::{
    CharacterId, ChatMessage, ChunkCoord, ClientEvent, ConnectionId, Lobby, LobbyId, ServerEvent,
    TilePatch, UserId,
};

use crate::auth::TokenResolver;
use crate::chat::{self, ChatLine, ROLL_SENDER, SYSTEM_SENDER};
use crate::error::SessionError;
use crate::hub::{Hub, Outbox};
use crate::presence::{Caller, PresenceTracker};

/// Number of chat lines replayed to a joining connection.
pub const CHAT_HISTORY_LIMIT: usize = 50;

/// Reason sent with `kicked` when the GM gives none.
pub const DEFAULT_BAN_REASON: &str = "You have been banned from this lobby";

/// Wires presence, rooms, the map engine and the store together.
pub struct Gateway<S> {
    store: Arc<S>,
    presence: PresenceTracker<S>,
    hub: Hub,
    chunks: ChunkStore<S>,
    markers: MarkerBoard<S>,
    membership: KeyedLocks<LobbyId>,
}

impl<S: Store> Gateway<S> {
    /// Create a gateway over `store`, accepting tokens signed for `tokens`.
    pub fn new(store: Arc<S>, tokens: TokenResolver) -> Self {
        Self {
            presence: PresenceTracker::new(Arc::clone(&store), tokens),
            hub: Hub::new(),
            chunks: ChunkStore::new(Arc::clone(&store)),
            markers: MarkerBoard::new(Arc::clone(&store)),
            membership: KeyedLocks::new(),
            store,
        }
    }

    /// The presence tracker.
    pub const fn presence(&self) -> &PresenceTracker<S> {
        &self.presence
    }

    /// The connection hub.
    pub const fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Register a new connection.
    pub async fn connect(&self) -> (ConnectionId, Outbox) {
        let conn = ConnectionId::new();
        let outbox = self.hub.register(conn).await;
        tracing::debug!(connection_id = %conn, "connection registered");
        (conn, outbox)
    }

    /// Tear down a connection. If it held presence, the lobby is told the
    /// user left.
    pub async fn disconnect(&self, conn: ConnectionId) {
        self.hub.unregister(conn).await;
        if let Some(departure) = self.presence.drop_connection(conn).await {
            tracing::info!(connection_id = %conn, user_id = %departure.user_id, "connection dropped");
            let left = ServerEvent::UserLeft {
                user_id: departure.user_id,
            };
            self.hub.broadcast(departure.lobby_id, &left).await;
        }
    }

    /// Handle one inbound event. Failures are reported to `conn` only.
    pub async fn handle(&self, conn: ConnectionId, event: ClientEvent) {
        let name = event.name();
        let lobby = event.lobby_id();
        if let Err(e) = self.dispatch(conn, event).await {
            match &e {
                SessionError::Storage(source) => {
                    tracing::error!(connection_id = %conn, lobby_id = %lobby, event = name, error = %source, "storage failure");
                }
                other => {
                    tracing::debug!(connection_id = %conn, lobby_id = %lobby, event = name, error = %other, "event rejected");
                }
            }
            self.hub.send_to(conn, e.to_event()).await;
        }
    }

    async fn dispatch(&self, conn: ConnectionId, event: ClientEvent) -> Result<(), SessionError> {
        if let ClientEvent::Authenticate { token, lobby_id } = &event {
            return self.authenticate(conn, token, *lobby_id).await;
        }

        let lobby = event.lobby_id();
        let (caller, _) = self.presence.authorize(conn, event.token(), lobby).await?;

        match event {
            // Handled before the gate.
            ClientEvent::Authenticate { .. } => Ok(()),
            ClientEvent::SendMessage { message, .. } => {
                self.send_message(conn, lobby, &caller, &message).await
            }
            ClientEvent::RollSkill {
                character_id,
                skill_name,
                extra_modifier,
                ..
            } => {
                self.roll_skill(lobby, &caller, character_id, &skill_name, extra_modifier)
                    .await
            }
            ClientEvent::RequestChunks {
                min_x,
                max_x,
                min_y,
                max_y,
                ..
            } => {
                let range = ChunkRange {
                    min_x,
                    max_x,
                    min_y,
                    max_y,
                };
                self.request_chunks(conn, lobby, range).await
            }
            ClientEvent::UpdateTile {
                chunk_x,
                chunk_y,
                tile_x,
                tile_y,
                updates,
                ..
            } => {
                let coord = ChunkCoord::new(chunk_x, chunk_y);
                self.update_tile(lobby, &caller, coord, tile_x, tile_y, &updates)
                    .await
            }
            ClientEvent::GetMapState { .. } => {
                let state = self.markers.state(lobby).await?;
                self.hub.send_to(conn, ServerEvent::MapState(state)).await;
                Ok(())
            }
            ClientEvent::AddMarker {
                x, y, marker_type, ..
            } => {
                let marker = self
                    .markers
                    .add(lobby, x, y, &marker_type, &caller.username)
                    .await?;
                self.hub
                    .broadcast(lobby, &ServerEvent::MarkerAdded { marker })
                    .await;
                Ok(())
            }
            ClientEvent::MoveMarker { marker_id, x, y, .. } => {
                self.markers.move_marker(lobby, marker_id, x, y).await?;
                self.hub
                    .broadcast(lobby, &ServerEvent::MarkerMoved { marker_id, x, y })
                    .await;
                Ok(())
            }
            ClientEvent::DeleteMarker { marker_id, .. } => {
                self.markers.delete(lobby, marker_id).await?;
                self.hub
                    .broadcast(lobby, &ServerEvent::MarkerDeleted { marker_id })
                    .await;
                Ok(())
            }
            ClientEvent::BanUser {
                user_id, reason, ..
            } => self.ban(lobby, &caller, user_id, reason).await,
            ClientEvent::UnbanUser { user_id, .. } => self.unban(lobby, &caller, user_id).await,
            ClientEvent::LeaveLobby { .. } => {
                self.leave(conn, lobby, &caller).await;
                Ok(())
            }
        }
    }

    // =========================================================================
    // Membership
    // =========================================================================

    async fn authenticate(
        &self,
        conn: ConnectionId,
        token: &str,
        lobby: LobbyId,
    ) -> Result<(), SessionError> {
        let _guard = self.membership.lock(lobby).await;
        let caller = self.presence.admit(token, lobby).await?;
        let messages = self.store.recent_chat(lobby, CHAT_HISTORY_LIMIT).await?;

        let admission = self.presence.record(conn, &caller, lobby).await;
        for displaced in admission.displaced {
            self.hub.leave_rooms(displaced).await;
        }
        self.hub.join(conn, lobby).await;
        for departure in admission.departures {
            let left = ServerEvent::UserLeft {
                user_id: departure.user_id,
            };
            self.hub.broadcast(departure.lobby_id, &left).await;
        }

        self.hub
            .send_to(
                conn,
                ServerEvent::Authenticated {
                    username: caller.username.clone(),
                },
            )
            .await;
        self.hub
            .broadcast(
                lobby,
                &ServerEvent::UserJoined {
                    user_id: caller.user_id,
                    username: caller.username,
                },
            )
            .await;

        let users = self.presence.online_users(lobby).await;
        self.hub
            .send_to(conn, ServerEvent::OnlineUsers { users })
            .await;
        self.hub
            .send_to(conn, ServerEvent::ChatHistory { messages })
            .await;
        Ok(())
    }

    async fn leave(&self, conn: ConnectionId, lobby: LobbyId, caller: &Caller) {
        self.presence.drop_connection(conn).await;
        self.hub.leave(conn, lobby).await;
        tracing::info!(connection_id = %conn, user_id = %caller.user_id, lobby_id = %lobby, "left lobby");
        self.hub
            .broadcast(
                lobby,
                &ServerEvent::UserLeft {
                    user_id: caller.user_id,
                },
            )
            .await;
    }

    async fn ban(
        &self,
        lobby: LobbyId,
        caller: &Caller,
        target: UserId,
        reason: Option<String>,
    ) -> Result<(), SessionError> {
        let _guard = self.membership.lock(lobby).await;
        self.require_gm(lobby, caller, target).await?;
        if !self.store.set_participant_banned(lobby, target, true).await? {
            return Err(SessionError::NotInLobby);
        }

        let reason = reason.unwrap_or_else(|| DEFAULT_BAN_REASON.to_owned());
        let mut kicked = 0_usize;
        for conn in self.hub.members(lobby).await {
            if self.presence.user_of(conn).await != Some(target) {
                continue;
            }
            self.hub
                .send_to(
                    conn,
                    ServerEvent::Kicked {
                        reason: reason.clone(),
                    },
                )
                .await;
            self.presence.drop_connection(conn).await;
            self.hub.leave(conn, lobby).await;
            kicked = kicked.saturating_add(1);
        }
        tracing::info!(lobby_id = %lobby, user_id = %target, kicked, "user banned");

        self.hub
            .broadcast(lobby, &ServerEvent::UserBanned { user_id: target })
            .await;
        self.hub
            .broadcast(lobby, &ServerEvent::UserLeft { user_id: target })
            .await;
        Ok(())
    }

    async fn unban(
        &self,
        lobby: LobbyId,
        caller: &Caller,
        target: UserId,
    ) -> Result<(), SessionError> {
        let _guard = self.membership.lock(lobby).await;
        self.require_gm(lobby, caller, target).await?;
        if !self.store.set_participant_banned(lobby, target, false).await? {
            return Err(SessionError::NotInLobby);
        }
        tracing::info!(lobby_id = %lobby, user_id = %target, "user unbanned");
        self.hub
            .broadcast(lobby, &ServerEvent::UserUnbanned { user_id: target })
            .await;
        Ok(())
    }

    /// Caller must be the GM and `target` must not be.
    async fn require_gm(
        &self,
        lobby: LobbyId,
        caller: &Caller,
        target: UserId,
    ) -> Result<(), SessionError> {
        let lobby = self.gm_lobby(lobby, caller).await?;
        if lobby.is_gm(target) {
            return Err(SessionError::CannotTargetGm);
        }
        Ok(())
    }

    async fn lobby(&self, lobby: LobbyId) -> Result<Lobby, SessionError> {
        self.store
            .get_lobby(lobby)
            .await?
            .ok_or(SessionError::LobbyNotFound)
    }

    async fn gm_lobby(&self, lobby: LobbyId, caller: &Caller) -> Result<Lobby, SessionError> {
        let lobby = self.lobby(lobby).await?;
        if !lobby.is_gm(caller.user_id) {
            return Err(SessionError::Forbidden("Only the game master can do that"));
        }
        Ok(lobby)
    }

    // =========================================================================
    // Chat and dice
    // =========================================================================

    async fn send_message(
        &self,
        conn: ConnectionId,
        lobby: LobbyId,
        caller: &Caller,
        message: &str,
    ) -> Result<(), SessionError> {
        if message.is_empty() {
            return Ok(());
        }
        let text = match chat::interpret(message) {
            ChatLine::Say(text) => text,
            ChatLine::Roll(roll) => roll.breakdown(),
            ChatLine::Notice(notice) => {
                let private = ServerEvent::NewMessage {
                    username: SYSTEM_SENDER.to_owned(),
                    message: notice,
                    timestamp: Utc::now(),
                };
                self.hub.send_to(conn, private).await;
                return Ok(());
            }
        };
        self.post(lobby, caller.user_id, &caller.username, text).await
    }

    async fn roll_skill(
        &self,
        lobby: LobbyId,
        caller: &Caller,
        character_id: CharacterId,
        skill: &str,
        extra_modifier: i64,
    ) -> Result<(), SessionError> {
        let character = self
            .store
            .get_character(character_id)
            .await?
            .ok_or(SessionError::CharacterNotFound)?;
        if character.user_id != caller.user_id && !self.lobby(lobby).await?.is_gm(caller.user_id) {
            return Err(SessionError::Forbidden("You cannot roll for this character"));
        }

        let check = roll_skill_check(&character.data, skill, extra_modifier)?;
        let text = format!(
            "{} ({}) rolled {skill}: {}",
            character.name,
            caller.username,
            check.breakdown()
        );
        self.post(lobby, caller.user_id, ROLL_SENDER, text).await
    }

    /// Persist a chat line, then broadcast it.
    async fn post(
        &self,
        lobby: LobbyId,
        user: UserId,
        username: &str,
        message: String,
    ) -> Result<(), SessionError> {
        let line = ChatMessage {
            lobby_id: lobby,
            user_id: user,
            username: username.to_owned(),
            message,
            timestamp: Utc::now(),
        };
        self.store.append_chat(&line).await?;
        self.hub
            .broadcast(
                lobby,
                &ServerEvent::NewMessage {
                    username: line.username,
                    message: line.message,
                    timestamp: line.timestamp,
                },
            )
            .await;
        Ok(())
    }

    // =========================================================================
    // Map
    // =========================================================================

    async fn request_chunks(
        &self,
        conn: ConnectionId,
        lobby: LobbyId,
        range: ChunkRange,
    ) -> Result<(), SessionError> {
        let mode = self.lobby(lobby).await?.map_mode;
        let chunks = self.chunks.get_or_create_range(lobby, range, mode).await?;
        self.hub.send_to(conn, ServerEvent::Chunks { chunks }).await;
        Ok(())
    }

    async fn update_tile(
        &self,
        lobby: LobbyId,
        caller: &Caller,
        coord: ChunkCoord,
        tile_x: i64,
        tile_y: i64,
        updates: &TilePatch,
    ) -> Result<(), SessionError> {
        self.gm_lobby(lobby, caller).await?;
        let tile = self
            .chunks
            .patch_tile(lobby, coord, tile_x, tile_y, updates)
            .await?;
        let event = ServerEvent::TileUpdated {
            chunk_x: coord.chunk_x,
            chunk_y: coord.chunk_y,
            tile_x: u32::try_from(tile_x).unwrap_or_default(),
            tile_y: u32::try_from(tile_y).unwrap_or_default(),
            tile,
        };
        self.hub.broadcast(lobby, &event).await;
        Ok(())
    }
}
