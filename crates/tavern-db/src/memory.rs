//! In-process [`Store`] backed by hash maps.
//!
//! Used for local development (`storage.backend: memory`) and as the
//! store behind the gateway test-suite. Seeding methods stand in for the
//! external lobby/character service. Writes can be switched off to
//! exercise storage-failure paths, and chunk writes are counted so tests
//! can assert "generated at most once" and "no write happened".

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;
use tavern_types::{
    Character, CharacterId, ChatMessage, Chunk, ChunkCoord, Lobby, LobbyId, MapState,
    Participant, User, UserId,
};
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::store::Store;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    lobbies: HashMap<LobbyId, Lobby>,
    participants: HashMap<(LobbyId, UserId), Participant>,
    characters: HashMap<CharacterId, Character>,
    chunks: HashMap<(LobbyId, ChunkCoord), Chunk>,
    map_states: HashMap<LobbyId, MapState>,
    chat: HashMap<LobbyId, Vec<ChatMessage>>,
}

/// Hash-map backed store. Cheap to construct; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    writes_disabled: AtomicBool,
    chunk_writes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Seeding (stands in for the external lobby service)
    // =========================================================================

    /// Insert or replace a user.
    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    /// Insert a lobby and its GM participant row.
    pub async fn insert_lobby(&self, lobby: Lobby) {
        let mut tables = self.tables.write().await;
        let gm = Participant {
            lobby_id: lobby.id,
            user_id: lobby.gm_id,
            joined_at: lobby.created_at,
            is_banned: false,
            character_id: None,
        };
        tables.participants.insert((lobby.id, lobby.gm_id), gm);
        tables.lobbies.insert(lobby.id, lobby);
    }

    /// Add `user` to `lobby` as a regular participant.
    pub async fn add_participant(&self, lobby: LobbyId, user: UserId) {
        let row = Participant {
            lobby_id: lobby,
            user_id: user,
            joined_at: Utc::now(),
            is_banned: false,
            character_id: None,
        };
        self.tables
            .write()
            .await
            .participants
            .insert((lobby, user), row);
    }

    /// Insert or replace a character sheet.
    pub async fn insert_character(&self, character: Character) {
        self.tables
            .write()
            .await
            .characters
            .insert(character.id, character);
    }

    // =========================================================================
    // Test hooks
    // =========================================================================

    /// When `true`, every write fails with [`DbError::Unavailable`].
    pub fn set_writes_disabled(&self, disabled: bool) {
        self.writes_disabled.store(disabled, Ordering::SeqCst);
    }

    /// Number of successful chunk writes since construction.
    pub fn chunk_writes(&self) -> usize {
        self.chunk_writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), DbError> {
        if self.writes_disabled.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable(String::from(
                "memory store writes disabled",
            )));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, DbError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_lobby(&self, id: LobbyId) -> Result<Option<Lobby>, DbError> {
        Ok(self.tables.read().await.lobbies.get(&id).cloned())
    }

    async fn get_participant(
        &self,
        lobby: LobbyId,
        user: UserId,
    ) -> Result<Option<Participant>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .participants
            .get(&(lobby, user))
            .cloned())
    }

    async fn set_participant_banned(
        &self,
        lobby: LobbyId,
        user: UserId,
        banned: bool,
    ) -> Result<bool, DbError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .participants
            .get_mut(&(lobby, user))
            .map(|row| row.is_banned = banned)
            .is_some())
    }

    async fn get_chunk(&self, lobby: LobbyId, coord: ChunkCoord) -> Result<Option<Chunk>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .chunks
            .get(&(lobby, coord))
            .cloned())
    }

    async fn put_chunk(&self, lobby: LobbyId, chunk: &Chunk) -> Result<(), DbError> {
        self.check_writable()?;
        self.tables
            .write()
            .await
            .chunks
            .insert((lobby, chunk.coord()), chunk.clone());
        self.chunk_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_map_state(&self, lobby: LobbyId) -> Result<Option<MapState>, DbError> {
        Ok(self.tables.read().await.map_states.get(&lobby).cloned())
    }

    async fn put_map_state(&self, lobby: LobbyId, state: &MapState) -> Result<(), DbError> {
        self.check_writable()?;
        self.tables
            .write()
            .await
            .map_states
            .insert(lobby, state.clone());
        Ok(())
    }

    async fn append_chat(&self, message: &ChatMessage) -> Result<(), DbError> {
        self.check_writable()?;
        self.tables
            .write()
            .await
            .chat
            .entry(message.lobby_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn recent_chat(&self, lobby: LobbyId, limit: usize) -> Result<Vec<ChatMessage>, DbError> {
        let tables = self.tables.read().await;
        let lines = tables.chat.get(&lobby).map_or(&[][..], Vec::as_slice);
        let skip = lines.len().saturating_sub(limit);
        Ok(lines.iter().skip(skip).cloned().collect())
    }

    async fn get_character(&self, id: CharacterId) -> Result<Option<Character>, DbError> {
        Ok(self.tables.read().await.characters.get(&id).cloned())
    }
}
