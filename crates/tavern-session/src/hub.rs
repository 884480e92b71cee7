//! Connection registry and lobby rooms.
//!
//! Each connection owns an unbounded outbound queue; the transport drains
//! it onto the socket. Broadcasts are fire-and-forget: a frame is queued
//! for every connection in the room at the moment of sending, and queues
//! whose receiver is gone are skipped.

use std::collections::{HashMap, HashSet};

use tavern_types::{ConnectionId, LobbyId, ServerEvent};
use tokio::sync::{RwLock, mpsc};

/// Receiving half of a connection's outbound queue.
pub type Outbox = mpsc::UnboundedReceiver<ServerEvent>;

#[derive(Debug, Default)]
struct HubInner {
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    rooms: HashMap<LobbyId, HashSet<ConnectionId>>,
}

impl HubInner {
    fn leave_all(&mut self, conn: ConnectionId) -> Vec<LobbyId> {
        let mut left = Vec::new();
        self.rooms.retain(|lobby, members| {
            if members.remove(&conn) {
                left.push(*lobby);
            }
            !members.is_empty()
        });
        left
    }
}

/// Registry of live connections and the lobby room each one is in.
#[derive(Debug, Default)]
pub struct Hub {
    inner: RwLock<HubInner>,
}

impl Hub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its outbound queue.
    pub async fn register(&self, conn: ConnectionId) -> Outbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.connections.insert(conn, tx);
        rx
    }

    /// Forget a connection. Returns the rooms it was in.
    pub async fn unregister(&self, conn: ConnectionId) -> Vec<LobbyId> {
        let mut inner = self.inner.write().await;
        inner.connections.remove(&conn);
        inner.leave_all(conn)
    }

    /// Put `conn` in `lobby`'s room, leaving any other room first.
    pub async fn join(&self, conn: ConnectionId, lobby: LobbyId) {
        let mut inner = self.inner.write().await;
        inner.leave_all(conn);
        inner.rooms.entry(lobby).or_default().insert(conn);
    }

    /// Take `conn` out of `lobby`'s room.
    pub async fn leave(&self, conn: ConnectionId, lobby: LobbyId) {
        let mut inner = self.inner.write().await;
        if let Some(members) = inner.rooms.get_mut(&lobby) {
            members.remove(&conn);
            if members.is_empty() {
                inner.rooms.remove(&lobby);
            }
        }
    }

    /// Take `conn` out of every room, keeping it registered. Returns the
    /// rooms it was in.
    pub async fn leave_rooms(&self, conn: ConnectionId) -> Vec<LobbyId> {
        self.inner.write().await.leave_all(conn)
    }

    /// Number of registered connections, in a room or not.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Connections currently in `lobby`'s room.
    pub async fn members(&self, lobby: LobbyId) -> Vec<ConnectionId> {
        self.inner
            .read()
            .await
            .rooms
            .get(&lobby)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Queue `event` for one connection. Returns whether it was queued.
    pub async fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.inner
            .read()
            .await
            .connections
            .get(&conn)
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Queue `event` for every connection in `lobby`'s room. Returns the
    /// number of connections it was queued for.
    pub async fn broadcast(&self, lobby: LobbyId, event: &ServerEvent) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(&lobby) else {
            return 0;
        };
        members
            .iter()
            .filter_map(|conn| inner.connections.get(conn))
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }
}
