//! End-to-end tests for the session gateway against the in-memory store.
//!
//! Each test drives the gateway the way the WebSocket transport does:
//! connect, feed `ClientEvent`s, and read `ServerEvent`s off the outbox.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::missing_panics_doc,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, Utc};
use serde_json::json;
use tavern_db::{DbError, MemoryStore, Store};
use tavern_session::{Gateway, Outbox, TokenResolver};
use tavern_types::{
    Character, CharacterId, ChatMessage, Chunk, ChunkCoord, ClientEvent, ConnectionId, Lobby,
    LobbyId, MapGenerationMode, MapState, Participant, ServerEvent, TilePatch, User, UserId,
};
use tokio::sync::Notify;

struct Table<S = MemoryStore> {
    store: Arc<S>,
    tokens: TokenResolver,
    gateway: Gateway<S>,
    lobby: LobbyId,
    gm: UserId,
}

struct Seat {
    user: UserId,
    token: String,
    conn: ConnectionId,
    outbox: Outbox,
}

impl Seat {
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.outbox.try_recv() {
            events.push(event);
        }
        events
    }
}

async fn table() -> Table {
    let store = Arc::new(MemoryStore::new());
    table_with(Arc::clone(&store), &store).await
}

/// A table whose gateway runs over `store`, with records seeded through
/// `seed`.
async fn table_with<S: Store>(store: Arc<S>, seed: &MemoryStore) -> Table<S> {
    let tokens = TokenResolver::new(b"gateway-tests");
    let gm = add_user(seed, "gm").await;
    let lobby = LobbyId::new();
    seed_lobby(seed, lobby, gm, "Friday game").await;
    let gateway = Gateway::new(Arc::clone(&store), tokens.clone());
    Table {
        store,
        tokens,
        gateway,
        lobby,
        gm,
    }
}

async fn seed_lobby(store: &MemoryStore, id: LobbyId, gm: UserId, name: &str) {
    store
        .insert_lobby(Lobby {
            id,
            name: name.to_owned(),
            gm_id: gm,
            map_mode: MapGenerationMode::Random,
            is_active: true,
            created_at: Utc::now(),
        })
        .await;
}

async fn add_user(store: &MemoryStore, name: &str) -> UserId {
    let id = UserId::new();
    store
        .insert_user(User {
            id,
            username: name.to_owned(),
        })
        .await;
    id
}

fn client_event(
    event: &str,
    token: &str,
    lobby: LobbyId,
    mut data: serde_json::Value,
) -> ClientEvent {
    data["token"] = json!(token);
    data["lobby_id"] = json!(lobby);
    serde_json::from_value(json!({ "event": event, "data": data })).unwrap()
}

impl<S: Store> Table<S> {
    /// Connect `user` without authenticating.
    async fn connect(&self, user: UserId) -> Seat {
        let (conn, outbox) = self.gateway.connect().await;
        Seat {
            user,
            token: self.tokens.issue(user, Duration::minutes(5)).unwrap(),
            conn,
            outbox,
        }
    }

    /// Connect and authenticate `user`, discarding the join frames.
    async fn join(&self, user: UserId) -> Seat {
        let mut seat = self.connect(user).await;
        self.send(&seat, "authenticate", json!({})).await;
        let frames = seat.drain();
        assert!(
            matches!(frames.first(), Some(ServerEvent::Authenticated { .. })),
            "join failed: {frames:?}"
        );
        seat
    }

    async fn send(&self, seat: &Seat, event: &str, data: serde_json::Value) {
        self.send_in(seat, self.lobby, event, data).await;
    }

    async fn send_in(
        &self,
        seat: &Seat,
        lobby: LobbyId,
        event: &str,
        data: serde_json::Value,
    ) {
        let event = client_event(event, &seat.token, lobby, data);
        self.gateway.handle(seat.conn, event).await;
    }
}

impl Table {
    async fn player(&self, name: &str) -> Seat {
        let user = add_user(&self.store, name).await;
        self.store.add_participant(self.lobby, user).await;
        self.join(user).await
    }

    /// A second lobby run by the same GM.
    async fn second_lobby(&self) -> LobbyId {
        let lobby = LobbyId::new();
        seed_lobby(&self.store, lobby, self.gm, "Sunday game").await;
        lobby
    }
}

/// Wraps the in-memory store with switches for failing chat reads and for
/// parking the next user lookup until released.
#[derive(Default)]
struct HookedStore {
    inner: MemoryStore,
    fail_chat_reads: AtomicBool,
    park_next_user_lookup: AtomicBool,
    parked: Notify,
    release: Notify,
}

impl Store for HookedStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, DbError> {
        if self.park_next_user_lookup.swap(false, Ordering::SeqCst) {
            self.parked.notify_one();
            self.release.notified().await;
        }
        self.inner.get_user(id).await
    }

    async fn get_lobby(&self, id: LobbyId) -> Result<Option<Lobby>, DbError> {
        self.inner.get_lobby(id).await
    }

    async fn get_participant(
        &self,
        lobby: LobbyId,
        user: UserId,
    ) -> Result<Option<Participant>, DbError> {
        self.inner.get_participant(lobby, user).await
    }

    async fn set_participant_banned(
        &self,
        lobby: LobbyId,
        user: UserId,
        banned: bool,
    ) -> Result<bool, DbError> {
        self.inner.set_participant_banned(lobby, user, banned).await
    }

    async fn get_chunk(
        &self,
        lobby: LobbyId,
        coord: ChunkCoord,
    ) -> Result<Option<Chunk>, DbError> {
        self.inner.get_chunk(lobby, coord).await
    }

    async fn put_chunk(&self, lobby: LobbyId, chunk: &Chunk) -> Result<(), DbError> {
        self.inner.put_chunk(lobby, chunk).await
    }

    async fn get_map_state(&self, lobby: LobbyId) -> Result<Option<MapState>, DbError> {
        self.inner.get_map_state(lobby).await
    }

    async fn put_map_state(&self, lobby: LobbyId, state: &MapState) -> Result<(), DbError> {
        self.inner.put_map_state(lobby, state).await
    }

    async fn append_chat(&self, message: &ChatMessage) -> Result<(), DbError> {
        self.inner.append_chat(message).await
    }

    async fn recent_chat(
        &self,
        lobby: LobbyId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, DbError> {
        if self.fail_chat_reads.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable(String::from("chat history offline")));
        }
        self.inner.recent_chat(lobby, limit).await
    }

    async fn get_character(&self, id: CharacterId) -> Result<Option<Character>, DbError> {
        self.inner.get_character(id).await
    }
}

/// A table over a [`HookedStore`] with the GM joined and one player,
/// `bob`, connected but not yet authenticated.
async fn hooked_table() -> (Table<HookedStore>, Seat, Seat) {
    let store = Arc::new(HookedStore::default());
    let t = table_with(Arc::clone(&store), &store.inner).await;
    let mut gm = t.join(t.gm).await;
    let bob = add_user(&store.inner, "bob").await;
    store.inner.add_participant(t.lobby, bob).await;
    let bob = t.connect(bob).await;
    gm.drain();
    (t, gm, bob)
}

fn error_code(events: &[ServerEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        ServerEvent::Error { code, .. } => Some(code.as_str()),
        _ => None,
    })
}

fn messages(events: &[ServerEvent]) -> Vec<(&str, &str)> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::NewMessage {
                username, message, ..
            } => Some((username.as_str(), message.as_str())),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Membership
// =============================================================================

#[tokio::test]
async fn authenticate_sends_join_sequence() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let user = add_user(&t.store, "ana").await;
    t.store.add_participant(t.lobby, user).await;

    let mut ana = t.connect(user).await;
    t.send(&ana, "authenticate", json!({})).await;
    let frames = ana.drain();

    assert!(matches!(&frames[0], ServerEvent::Authenticated { username } if username == "ana"));
    assert!(matches!(&frames[1], ServerEvent::UserJoined { user_id, .. } if *user_id == user));
    let ServerEvent::OnlineUsers { users } = &frames[2] else {
        panic!("expected online_users, got {:?}", frames[2]);
    };
    assert_eq!(users.len(), 2);
    assert!(matches!(&frames[3], ServerEvent::ChatHistory { messages } if messages.is_empty()));

    assert!(
        gm.drain()
            .iter()
            .any(|e| matches!(e, ServerEvent::UserJoined { username, .. } if username == "ana"))
    );
}

#[tokio::test]
async fn invalid_token_is_not_admitted() {
    let t = table().await;
    let (conn, mut outbox) = t.gateway.connect().await;
    let event = ClientEvent::Authenticate {
        token: String::from("nope"),
        lobby_id: t.lobby,
    };
    t.gateway.handle(conn, event).await;

    let frames: Vec<_> = std::iter::from_fn(|| outbox.try_recv().ok()).collect();
    assert_eq!(error_code(&frames), Some("invalid_token"));
    assert!(t.gateway.hub().members(t.lobby).await.is_empty());
}

#[tokio::test]
async fn events_without_presence_are_rejected() {
    let t = table().await;
    let user = add_user(&t.store, "ana").await;
    t.store.add_participant(t.lobby, user).await;
    let mut ana = t.connect(user).await;

    t.send(&ana, "add_marker", json!({ "x": 1.0, "y": 1.0, "type": "token" }))
        .await;
    assert_eq!(error_code(&ana.drain()), Some("not_in_lobby"));
    assert!(t.store.get_map_state(t.lobby).await.unwrap().is_none());
}

#[tokio::test]
async fn history_replays_last_fifty_chronologically() {
    let t = table().await;
    let ana = t.player("ana").await;
    for i in 0..55 {
        t.send(&ana, "send_message", json!({ "message": format!("line {i}") }))
            .await;
    }

    let mut late = t.connect(t.gm).await;
    t.send(&late, "authenticate", json!({})).await;
    let history = late
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::ChatHistory { messages } => Some(messages),
            _ => None,
        })
        .unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0].message, "line 5");
    assert_eq!(history[49].message, "line 54");
}

#[tokio::test]
async fn disconnect_broadcasts_user_left() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let ana = t.player("ana").await;
    gm.drain();

    t.gateway.disconnect(ana.conn).await;
    assert!(
        gm.drain()
            .iter()
            .any(|e| matches!(e, ServerEvent::UserLeft { user_id } if *user_id == ana.user))
    );

    // Idempotent.
    t.gateway.disconnect(ana.conn).await;
    assert!(gm.drain().is_empty());
}

#[tokio::test]
async fn leave_lobby_keeps_the_socket() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let mut ana = t.player("ana").await;
    gm.drain();

    t.send(&ana, "leave_lobby", json!({})).await;
    assert!(gm.drain().iter().any(|e| matches!(e, ServerEvent::UserLeft { .. })));

    t.send(&ana, "send_message", json!({ "message": "still here?" })).await;
    assert_eq!(error_code(&ana.drain()), Some("not_in_lobby"));

    t.send(&ana, "authenticate", json!({})).await;
    assert!(matches!(ana.drain().first(), Some(ServerEvent::Authenticated { .. })));
}

#[tokio::test]
async fn moving_lobby_leaves_the_old_room() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let mut tab1 = t.player("ana").await;
    let other = t.second_lobby().await;
    t.store.add_participant(other, tab1.user).await;
    let cleric = add_user(&t.store, "cleric").await;
    t.store.add_participant(other, cleric).await;
    let mut watcher = t.connect(cleric).await;
    t.send_in(&watcher, other, "authenticate", json!({})).await;
    gm.drain();
    watcher.drain();

    let mut tab2 = t.connect(tab1.user).await;
    t.send_in(&tab2, other, "authenticate", json!({})).await;
    assert!(matches!(tab2.drain().first(), Some(ServerEvent::Authenticated { .. })));

    assert!(gm.drain().contains(&ServerEvent::UserLeft { user_id: tab1.user }));
    assert_eq!(t.gateway.hub().members(t.lobby).await, vec![gm.conn]);
    assert!(watcher.drain().iter().any(
        |e| matches!(e, ServerEvent::UserJoined { user_id, .. } if *user_id == tab1.user)
    ));

    tab1.drain();
    t.send(&gm, "send_message", json!({ "message": "anyone left?" })).await;
    assert!(tab1.drain().is_empty());
    t.send(&tab1, "send_message", json!({ "message": "me" })).await;
    assert_eq!(error_code(&tab1.drain()), Some("not_in_lobby"));
    gm.drain();

    // The displaced tab no longer speaks for either lobby.
    t.gateway.disconnect(tab1.conn).await;
    assert!(watcher.drain().is_empty());
    assert!(gm.drain().is_empty());
    assert_eq!(t.gateway.presence().online_users(other).await.len(), 2);
}

#[tokio::test]
async fn failed_history_read_grants_nothing() {
    let (t, mut gm, mut bob) = hooked_table().await;

    t.store.fail_chat_reads.store(true, Ordering::SeqCst);
    t.send(&bob, "authenticate", json!({})).await;
    let frames = bob.drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(error_code(&frames), Some("storage_error"));
    assert!(t.gateway.presence().user_of(bob.conn).await.is_none());
    assert!(t.gateway.presence().lobby_of(bob.user).await.is_none());
    assert_eq!(t.gateway.hub().members(t.lobby).await, vec![gm.conn]);
    assert!(gm.drain().is_empty());

    t.store.fail_chat_reads.store(false, Ordering::SeqCst);
    t.send(&bob, "authenticate", json!({})).await;
    assert!(matches!(bob.drain().first(), Some(ServerEvent::Authenticated { .. })));
}

// =============================================================================
// Bans
// =============================================================================

#[tokio::test]
async fn ban_waits_for_a_join_in_progress() {
    let (t, mut gm, mut bob) = hooked_table().await;

    t.store.park_next_user_lookup.store(true, Ordering::SeqCst);
    let join = t.send(&bob, "authenticate", json!({}));
    let ban = async {
        t.store.parked.notified().await;
        let banning = t.send(
            &gm,
            "ban_user",
            json!({ "user_id": bob.user, "reason": "cheating" }),
        );
        let release = async {
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            t.store.release.notify_one();
        };
        tokio::join!(banning, release);
    };
    tokio::join!(join, ban);

    let frames = bob.drain();
    assert!(matches!(frames.first(), Some(ServerEvent::Authenticated { .. })));
    assert!(frames.contains(&ServerEvent::Kicked {
        reason: String::from("cheating")
    }));
    assert!(t.gateway.presence().user_of(bob.conn).await.is_none());
    assert_eq!(t.gateway.hub().members(t.lobby).await, vec![gm.conn]);
    assert!(gm.drain().contains(&ServerEvent::UserBanned { user_id: bob.user }));
}

#[tokio::test]
async fn ban_kicks_every_connection_then_unban_restores() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let mut tab1 = t.player("bob").await;
    let mut tab2 = t.join(tab1.user).await;
    let mut carol = t.player("carol").await;
    gm.drain();
    carol.drain();

    t.send(
        &gm,
        "ban_user",
        json!({ "user_id": tab1.user, "reason": "spam" }),
    )
    .await;

    for tab in [&mut tab1, &mut tab2] {
        let frames = tab.drain();
        assert!(frames.contains(&ServerEvent::Kicked {
            reason: String::from("spam")
        }));
    }
    let seen = carol.drain();
    assert!(seen.contains(&ServerEvent::UserBanned { user_id: tab1.user }));
    assert!(seen.contains(&ServerEvent::UserLeft { user_id: tab1.user }));
    assert_eq!(t.gateway.hub().members(t.lobby).await.len(), 2);

    t.send(&tab1, "authenticate", json!({})).await;
    assert_eq!(error_code(&tab1.drain()), Some("banned"));

    t.send(&gm, "unban_user", json!({ "user_id": tab1.user })).await;
    assert!(carol.drain().contains(&ServerEvent::UserUnbanned { user_id: tab1.user }));

    t.send(&tab1, "authenticate", json!({})).await;
    assert!(matches!(tab1.drain().first(), Some(ServerEvent::Authenticated { .. })));
}

#[tokio::test]
async fn ban_is_gm_only_and_cannot_target_gm() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let mut ana = t.player("ana").await;

    t.send(&ana, "ban_user", json!({ "user_id": t.gm })).await;
    assert_eq!(error_code(&ana.drain()), Some("forbidden"));

    t.send(&gm, "ban_user", json!({ "user_id": t.gm })).await;
    assert_eq!(error_code(&gm.drain()), Some("cannot_target_gm"));

    t.send(&gm, "ban_user", json!({ "user_id": UserId::new() })).await;
    assert_eq!(error_code(&gm.drain()), Some("not_in_lobby"));
}

// =============================================================================
// Chat and dice
// =============================================================================

#[tokio::test]
async fn roll_command_stores_breakdown_only() {
    let t = table().await;
    let mut ana = t.player("ana").await;

    t.send(&ana, "send_message", json!({ "message": "/roll 2d6" })).await;
    let frames = ana.drain();
    let said = messages(&frames);
    assert_eq!(said.len(), 1);
    assert_eq!(said[0].0, "ana");
    assert!(said[0].1.starts_with("Roll 2d6+0: "));

    let stored = t.store.recent_chat(t.lobby, 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].message.contains("/roll"));
}

#[tokio::test]
async fn malformed_roll_is_private_and_not_stored() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let mut ana = t.player("ana").await;
    gm.drain();

    t.send(&ana, "send_message", json!({ "message": "/roll xyz" })).await;
    t.send(&ana, "send_message", json!({ "message": "/roll" })).await;
    let said = ana.drain();
    assert_eq!(
        messages(&said),
        vec![
            ("System", "Invalid format. Use /roll 2d6+3"),
            ("System", "Usage: /roll 2d6+3"),
        ]
    );
    assert!(gm.drain().is_empty());
    assert!(t.store.recent_chat(t.lobby, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn storage_failure_suppresses_broadcast() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let mut ana = t.player("ana").await;
    gm.drain();

    t.store.set_writes_disabled(true);
    t.send(&ana, "send_message", json!({ "message": "lost" })).await;
    t.send(&ana, "add_marker", json!({ "x": 0.0, "y": 0.0, "type": "poi" }))
        .await;

    let frames = ana.drain();
    let codes: Vec<_> = frames
        .iter()
        .filter_map(|e| match e {
            ServerEvent::Error { code, .. } => Some(code.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(codes, ["storage_error", "storage_error"]);
    assert!(gm.drain().is_empty());
}

async fn seed_character(t: &Table, owner: UserId) -> CharacterId {
    let id = CharacterId::new();
    t.store
        .insert_character(Character {
            id,
            user_id: owner,
            name: String::from("Mira"),
            data: json!({
                "skills": { "Stealth": 5 },
                "data": { "skills": { "Stealth": 9 } }
            }),
        })
        .await;
    id
}

#[tokio::test]
async fn skill_roll_uses_top_level_bonus() {
    let t = table().await;
    let mut ana = t.player("ana").await;
    let character = seed_character(&t, ana.user).await;

    t.send(
        &ana,
        "roll_skill",
        json!({ "character_id": character, "skill_name": "Stealth", "extra_modifier": 2 }),
    )
    .await;
    let frames = ana.drain();
    let said = messages(&frames);
    assert_eq!(said.len(), 1);
    let (sender, text) = said[0];
    assert_eq!(sender, "System (Roll)");
    assert!(text.starts_with("Mira (ana) rolled Stealth: 1d20 ("));
    assert!(text.contains(" + 5 (skill) + 2 (mod) = **"));

    let total: i64 = text
        .rsplit("**")
        .nth(1)
        .and_then(|n| n.parse().ok())
        .unwrap();
    assert!((8..=27).contains(&total));
    assert_eq!(t.store.recent_chat(t.lobby, 5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn skill_roll_ownership_and_missing_skill() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let mut ana = t.player("ana").await;
    let mut bob = t.player("bob").await;
    let character = seed_character(&t, ana.user).await;

    t.send(
        &bob,
        "roll_skill",
        json!({ "character_id": character, "skill_name": "Stealth" }),
    )
    .await;
    assert_eq!(error_code(&bob.drain()), Some("forbidden"));

    gm.drain();
    t.send(
        &gm,
        "roll_skill",
        json!({ "character_id": character, "skill_name": "Stealth" }),
    )
    .await;
    assert!(error_code(&gm.drain()).is_none());

    t.send(
        &ana,
        "roll_skill",
        json!({ "character_id": character, "skill_name": "Arcana" }),
    )
    .await;
    let frames = ana.drain();
    assert!(frames.contains(&ServerEvent::Error {
        code: String::from("skill_not_found"),
        message: String::from("Skill Arcana not found"),
    }));

    t.send(
        &ana,
        "roll_skill",
        json!({ "character_id": CharacterId::new(), "skill_name": "Stealth" }),
    )
    .await;
    assert_eq!(error_code(&ana.drain()), Some("character_not_found"));
}

// =============================================================================
// Map
// =============================================================================

#[tokio::test]
async fn chunk_requests_are_idempotent() {
    let t = table().await;
    let mut ana = t.player("ana").await;
    let range = json!({ "min_x": -1, "max_x": 0, "min_y": 0, "max_y": 1 });

    t.send(&ana, "request_chunks", range.clone()).await;
    let first = match ana.drain().pop() {
        Some(ServerEvent::Chunks { chunks }) => chunks,
        other => panic!("expected chunks, got {other:?}"),
    };
    assert_eq!(first.len(), 4);
    assert!(first.iter().all(tavern_types::Chunk::is_well_formed));

    t.send(&ana, "request_chunks", range).await;
    let Some(ServerEvent::Chunks { chunks: second }) = ana.drain().pop() else {
        panic!("expected chunks");
    };
    for chunk in &first {
        assert!(second.contains(chunk));
    }
    assert_eq!(t.store.chunk_writes(), 4);

    t.send(
        &ana,
        "request_chunks",
        json!({ "min_x": 0, "max_x": 100, "min_y": 0, "max_y": 100 }),
    )
    .await;
    assert_eq!(error_code(&ana.drain()), Some("out_of_range"));
}

#[tokio::test]
async fn tile_updates_are_gm_only_and_partial() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let mut ana = t.player("ana").await;
    let patch = json!({ "chunk_x": 0, "chunk_y": 0, "tile_x": 3, "tile_y": 4, "updates": { "color": "#fff" } });

    t.send(&ana, "update_tile", patch.clone()).await;
    assert_eq!(error_code(&ana.drain()), Some("forbidden"));
    assert_eq!(t.store.chunk_writes(), 0);

    t.send(&gm, "update_tile", patch).await;
    let updated = ana
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::TileUpdated {
                tile_x: 3,
                tile_y: 4,
                tile,
                ..
            } => Some(tile),
            _ => None,
        })
        .unwrap();
    assert_eq!(updated.color, "#fff");

    let stored = t
        .store
        .get_chunk(t.lobby, ChunkCoord::new(0, 0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.tiles[4][3], updated);

    gm.drain();
    let writes = t.store.chunk_writes();
    t.send(
        &gm,
        "update_tile",
        json!({ "chunk_x": 0, "chunk_y": 0, "tile_x": 32, "tile_y": 0, "updates": TilePatch::default() }),
    )
    .await;
    assert_eq!(error_code(&gm.drain()), Some("out_of_range"));
    assert_eq!(t.store.chunk_writes(), writes);
}

#[tokio::test]
async fn marker_events_broadcast_and_persist() {
    let t = table().await;
    let mut gm = t.join(t.gm).await;
    let mut ana = t.player("ana").await;
    gm.drain();

    t.send(&ana, "add_marker", json!({ "x": 1.0, "y": 2.0, "type": "token" }))
        .await;
    let marker = gm
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::MarkerAdded { marker } => Some(marker),
            _ => None,
        })
        .unwrap();
    assert_eq!(marker.id, 1);
    assert_eq!(marker.created_by, "ana");

    t.send(&ana, "move_marker", json!({ "marker_id": 1, "x": 4.0, "y": 4.0 }))
        .await;
    t.send(&ana, "delete_marker", json!({ "marker_id": 1 })).await;
    t.send(&ana, "delete_marker", json!({ "marker_id": 1 })).await;
    let frames = gm.drain();
    assert_eq!(
        frames
            .iter()
            .filter(|e| matches!(e, ServerEvent::MarkerDeleted { marker_id: 1 }))
            .count(),
        2
    );
    assert!(frames.iter().any(|e| matches!(e, ServerEvent::MarkerMoved { marker_id: 1, .. })));

    ana.drain();
    t.send(&ana, "get_map_state", json!({})).await;
    let Some(ServerEvent::MapState(state)) = ana.drain().pop() else {
        panic!("expected map_state");
    };
    assert!(state.markers.is_empty());
}
