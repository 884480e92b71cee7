//! Presence and membership tracking.
//!
//! One process-local map, guarded by a mutex: connection -> (user, lobby).
//! A user is present in at most one lobby at a time. Admitting a
//! connection to a new lobby displaces the user's connections that are
//! still in another one.
//!
//! Nothing here is persisted. Membership and bans live in the store and
//! are re-checked on every event, so a ban takes effect even for a
//! connection whose presence entry predates it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tavern_db::Store;
use tavern_types::{ConnectionId, LobbyId, OnlineUser, Participant, UserId};
use tokio::sync::Mutex;

use crate::auth::TokenResolver;
use crate::error::SessionError;

/// The authenticated identity behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Resolved user.
    pub user_id: UserId,
    /// Display name at join time.
    pub username: String,
}

/// A user's presence in a lobby that has just ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// The user who left.
    pub user_id: UserId,
    /// The lobby they left.
    pub lobby_id: LobbyId,
}

/// Side effects of recording a connection's presence.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Admission {
    /// The user's other connections, evicted from the lobby they were in.
    pub displaced: Vec<ConnectionId>,
    /// Lobbies in which a user no longer has any connection.
    pub departures: Vec<Departure>,
}

#[derive(Debug, Clone)]
struct Entry {
    caller: Caller,
    lobby: LobbyId,
}

#[derive(Debug, Default)]
struct PresenceMaps {
    connections: HashMap<ConnectionId, Entry>,
}

impl PresenceMaps {
    fn is_present(&self, user: UserId, lobby: LobbyId) -> bool {
        self.connections
            .values()
            .any(|e| e.caller.user_id == user && e.lobby == lobby)
    }
}

/// Tracks which connection belongs to which user and which lobby each
/// connection is present in.
pub struct PresenceTracker<S> {
    store: Arc<S>,
    tokens: TokenResolver,
    maps: Mutex<PresenceMaps>,
}

impl<S: Store> PresenceTracker<S> {
    /// Create an empty tracker.
    pub fn new(store: Arc<S>, tokens: TokenResolver) -> Self {
        Self {
            store,
            tokens,
            maps: Mutex::new(PresenceMaps::default()),
        }
    }

    /// Check that `token` may join `lobby`: it must resolve to a known user
    /// with a non-banned participant row. Presence is not touched.
    pub async fn admit(&self, token: &str, lobby: LobbyId) -> Result<Caller, SessionError> {
        let user_id = self.tokens.resolve(token)?;
        self.participant(lobby, user_id).await?;
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(SessionError::InvalidToken)?;
        Ok(Caller {
            user_id,
            username: user.username,
        })
    }

    /// Record `conn` as `caller`'s connection in `lobby`.
    ///
    /// The user's connections in any other lobby are removed and returned
    /// as displaced. Every `(user, lobby)` pair left without a connection
    /// is reported as a departure.
    pub async fn record(
        &self,
        conn: ConnectionId,
        caller: &Caller,
        lobby: LobbyId,
    ) -> Admission {
        let mut maps = self.maps.lock().await;
        let displaced: Vec<ConnectionId> = maps
            .connections
            .iter()
            .filter(|(c, e)| {
                **c != conn && e.caller.user_id == caller.user_id && e.lobby != lobby
            })
            .map(|(c, _)| *c)
            .collect();

        let mut vacated: Vec<Entry> = displaced
            .iter()
            .filter_map(|c| maps.connections.remove(c))
            .collect();
        let replaced = maps.connections.insert(
            conn,
            Entry {
                caller: caller.clone(),
                lobby,
            },
        );
        vacated.extend(replaced);

        let mut departures = Vec::new();
        for entry in vacated {
            let departure = Departure {
                user_id: entry.caller.user_id,
                lobby_id: entry.lobby,
            };
            if !maps.is_present(departure.user_id, departure.lobby_id)
                && !departures.contains(&departure)
            {
                departures.push(departure);
            }
        }
        drop(maps);

        for departure in &departures {
            tracing::debug!(
                user_id = %departure.user_id,
                from = %departure.lobby_id,
                to = %lobby,
                "presence moved"
            );
        }
        tracing::info!(connection_id = %conn, user_id = %caller.user_id, lobby_id = %lobby, "presence granted");
        Admission {
            displaced,
            departures,
        }
    }

    /// Gate for every event after `authenticate`: the token must name the
    /// connection's user, the connection must be present in `lobby`, and
    /// the participant row must still exist and not be banned.
    pub async fn authorize(
        &self,
        conn: ConnectionId,
        token: &str,
        lobby: LobbyId,
    ) -> Result<(Caller, Participant), SessionError> {
        let user_id = self.tokens.resolve(token)?;
        let caller = {
            let maps = self.maps.lock().await;
            let present = maps
                .connections
                .get(&conn)
                .filter(|e| e.caller.user_id == user_id && e.lobby == lobby);
            present
                .map(|e| e.caller.clone())
                .ok_or(SessionError::NotInLobby)?
        };
        let participant = self.participant(lobby, user_id).await?;
        Ok((caller, participant))
    }

    /// Remove `conn` and report the lobby it was present in. Dropping an
    /// unknown connection returns `None`.
    pub async fn drop_connection(&self, conn: ConnectionId) -> Option<Departure> {
        let entry = self.maps.lock().await.connections.remove(&conn)?;
        Some(Departure {
            user_id: entry.caller.user_id,
            lobby_id: entry.lobby,
        })
    }

    /// The user behind `conn`, if authenticated.
    pub async fn user_of(&self, conn: ConnectionId) -> Option<UserId> {
        self.maps
            .lock()
            .await
            .connections
            .get(&conn)
            .map(|e| e.caller.user_id)
    }

    /// The lobby `user` is present in, if any.
    pub async fn lobby_of(&self, user: UserId) -> Option<LobbyId> {
        self.maps
            .lock()
            .await
            .connections
            .values()
            .find(|e| e.caller.user_id == user)
            .map(|e| e.lobby)
    }

    /// Distinct users present in `lobby`, sorted by name.
    pub async fn online_users(&self, lobby: LobbyId) -> Vec<OnlineUser> {
        let maps = self.maps.lock().await;
        let mut seen = HashSet::new();
        let mut users: Vec<OnlineUser> = maps
            .connections
            .values()
            .filter(|e| e.lobby == lobby)
            .filter(|e| seen.insert(e.caller.user_id))
            .map(|e| OnlineUser {
                user_id: e.caller.user_id,
                username: e.caller.username.clone(),
            })
            .collect();
        drop(maps);
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    async fn participant(&self, lobby: LobbyId, user: UserId) -> Result<Participant, SessionError> {
        let participant = self
            .store
            .get_participant(lobby, user)
            .await?
            .ok_or(SessionError::NotInLobby)?;
        if participant.is_banned {
            return Err(SessionError::Banned);
        }
        Ok(participant)
    }
}
