//! Chunked map engine for Tavern lobbies.
//!
//! The map is an unbounded grid of tiles, stored and generated in
//! square chunks. Chunks come into existence the first time a client
//! looks at them; the lobby's [`MapGenerationMode`](tavern_types::MapGenerationMode)
//! decides what they look like. Markers live in a separate per-lobby
//! blob.
//!
//! # Modules
//!
//! - [`generator`] -- Mode-dependent chunk generation
//! - [`chunk_store`] -- Lazy materialization and tile patches
//! - [`markers`] -- Marker add / move / delete
//! - [`locks`] -- Per-key async locks used by both stores
//! - [`error`] -- Map error type

pub mod chunk_store;
pub mod error;
pub mod generator;
pub mod locks;
pub mod markers;

pub use chunk_store::{ChunkRange, ChunkStore, MAX_CHUNKS_PER_REQUEST};
pub use error::MapError;
pub use generator::{generate_chunk, generate_chunk_with};
pub use locks::KeyedLocks;
pub use markers::MarkerBoard;
