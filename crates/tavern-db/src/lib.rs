//! Storage layer for Tavern lobbies.
//!
//! The realtime core talks to storage only through the [`Store`] trait.
//! Two implementations ship with this crate:
//!
//! ```text
//! Session gateway / map engine
//!     |
//!     +-- Store (trait)
//!         |-- MemoryStore    (hash maps; dev + tests)
//!         +-- PostgresStore  (PostgresPool)
//!             |-- LobbyStore  (users, lobbies, participants, characters)
//!             |-- MapStore    (chunk grids, map state; JSONB)
//!             +-- ChatStore   (append-only chat log)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The storage trait
//! - [`memory`] -- In-process store
//! - [`postgres`] -- `PostgreSQL` pool, configuration and store
//! - [`lobby_store`] -- Lobby, membership and character queries
//! - [`map_store`] -- Chunk and map state persistence
//! - [`chat_store`] -- Chat log persistence
//! - [`error`] -- Shared error types

pub mod chat_store;
pub mod error;
pub mod lobby_store;
pub mod map_store;
pub mod memory;
pub mod postgres;
pub mod store;

pub use chat_store::ChatStore;
pub use error::DbError;
pub use lobby_store::LobbyStore;
pub use map_store::MapStore;
pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresPool, PostgresStore};
pub use store::Store;
