//! Lazily materialized chunk storage.
//!
//! A chunk is generated the first time any coordinate inside it is read
//! and persisted before it is returned. Every read-modify-write on one
//! `(lobby, coordinate)` pair runs under that pair's lock, so concurrent
//! range requests generate a chunk at most once and concurrent tile
//! patches on the same chunk never lose an update.

use std::sync::Arc;

use tavern_db::Store;
use tavern_types::{CHUNK_SIZE, Chunk, ChunkCoord, LobbyId, MapGenerationMode, Tile, TilePatch};

use crate::error::MapError;
use crate::generator::generate_chunk;
use crate::locks::KeyedLocks;

/// Most coordinates a single range request may cover.
pub const MAX_CHUNKS_PER_REQUEST: u64 = 64;

/// Inclusive rectangle of chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Smallest chunk x.
    pub min_x: i32,
    /// Largest chunk x.
    pub max_x: i32,
    /// Smallest chunk y.
    pub min_y: i32,
    /// Largest chunk y.
    pub max_y: i32,
}

impl ChunkRange {
    /// Number of coordinates covered. Zero when either axis is inverted.
    pub fn len(&self) -> u64 {
        let span = |lo: i32, hi: i32| {
            u64::try_from(i64::from(hi).saturating_sub(i64::from(lo)).saturating_add(1))
                .unwrap_or(0)
        };
        span(self.min_x, self.max_x).saturating_mul(span(self.min_y, self.max_y))
    }

    /// Whether the range covers no coordinate.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every covered coordinate, row by row.
    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + use<> {
        let Self {
            min_x,
            max_x,
            min_y,
            max_y,
        } = *self;
        (min_y..=max_y).flat_map(move |y| (min_x..=max_x).map(move |x| ChunkCoord::new(x, y)))
    }
}

/// Chunk store for all lobbies, shared behind an `Arc`.
pub struct ChunkStore<S> {
    store: Arc<S>,
    locks: KeyedLocks<(LobbyId, ChunkCoord)>,
}

impl<S: Store> ChunkStore<S> {
    /// Create a chunk store over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Return every chunk in `range`, generating and persisting any that
    /// do not exist yet with `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::RangeTooLarge`] (before touching storage) when
    /// the range exceeds [`MAX_CHUNKS_PER_REQUEST`], or
    /// [`MapError::Storage`] if a read or write fails.
    pub async fn get_or_create_range(
        &self,
        lobby: LobbyId,
        range: ChunkRange,
        mode: MapGenerationMode,
    ) -> Result<Vec<Chunk>, MapError> {
        let requested = range.len();
        if requested > MAX_CHUNKS_PER_REQUEST {
            return Err(MapError::RangeTooLarge {
                requested,
                max: MAX_CHUNKS_PER_REQUEST,
            });
        }

        let mut chunks = Vec::with_capacity(usize::try_from(requested).unwrap_or_default());
        for coord in range.coords() {
            chunks.push(self.get_or_create(lobby, coord, mode).await?);
        }
        Ok(chunks)
    }

    /// Return the chunk at `coord`, generating it with `mode` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Storage`] if a read or write fails.
    pub async fn get_or_create(
        &self,
        lobby: LobbyId,
        coord: ChunkCoord,
        mode: MapGenerationMode,
    ) -> Result<Chunk, MapError> {
        let _guard = self.locks.lock((lobby, coord)).await;
        self.load_or_generate(lobby, coord, mode).await
    }

    /// Overwrite the fields named in `patch` on one tile and persist the
    /// whole chunk. A missing chunk is first generated as plain grass.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::TileOutOfRange`] (before touching storage) when
    /// either index is outside `[0, CHUNK_SIZE)`, or [`MapError::Storage`]
    /// if a read or write fails.
    pub async fn patch_tile(
        &self,
        lobby: LobbyId,
        coord: ChunkCoord,
        tile_x: i64,
        tile_y: i64,
        patch: &TilePatch,
    ) -> Result<Tile, MapError> {
        let out_of_range = || MapError::TileOutOfRange { tile_x, tile_y };
        let in_chunk = |v: i64| usize::try_from(v).ok().filter(|v| *v < CHUNK_SIZE);
        let (Some(x), Some(y)) = (in_chunk(tile_x), in_chunk(tile_y)) else {
            return Err(out_of_range());
        };

        let _guard = self.locks.lock((lobby, coord)).await;
        let mut chunk = self
            .load_or_generate(lobby, coord, MapGenerationMode::Empty)
            .await?;
        let tile = chunk.tile_mut(x, y).ok_or_else(out_of_range)?;
        patch.apply(tile);
        let updated = tile.clone();

        self.store.put_chunk(lobby, &chunk).await?;
        tracing::debug!(%lobby, chunk_x = coord.chunk_x, chunk_y = coord.chunk_y, tile_x, tile_y, "Patched tile");
        Ok(updated)
    }

    /// Caller must hold the `(lobby, coord)` lock.
    async fn load_or_generate(
        &self,
        lobby: LobbyId,
        coord: ChunkCoord,
        mode: MapGenerationMode,
    ) -> Result<Chunk, MapError> {
        match self.store.get_chunk(lobby, coord).await? {
            Some(chunk) if chunk.is_well_formed() => return Ok(chunk),
            Some(_) => {
                tracing::warn!(%lobby, chunk_x = coord.chunk_x, chunk_y = coord.chunk_y, "malformed chunk grid, regenerating");
            }
            None => {}
        }

        let chunk = generate_chunk(coord, mode);
        self.store.put_chunk(lobby, &chunk).await?;
        tracing::debug!(%lobby, chunk_x = coord.chunk_x, chunk_y = coord.chunk_y, mode = mode.as_str(), "Generated chunk");
        Ok(chunk)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use tavern_db::MemoryStore;
    use tavern_types::TileType;

    use super::*;

    fn setup() -> (Arc<MemoryStore>, ChunkStore<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Arc::clone(&store), ChunkStore::new(store))
    }

    const fn range(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> ChunkRange {
        ChunkRange {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    #[test]
    fn range_len() {
        assert_eq!(range(0, 0, 0, 0).len(), 1);
        assert_eq!(range(-1, 1, -1, 1).len(), 9);
        assert_eq!(range(1, 0, 0, 0).len(), 0);
        assert_eq!(range(i32::MIN, i32::MAX, 0, 0).len(), 1 << 32);
        assert_eq!(range(i32::MIN, i32::MAX, i32::MIN, i32::MAX).len(), u64::MAX);
        assert_eq!(range(-1, 1, 0, 1).coords().count(), 6);
    }

    #[tokio::test]
    async fn range_generates_once_then_reads() {
        let (store, chunks) = setup();
        let lobby = LobbyId::new();

        let first = chunks
            .get_or_create_range(lobby, range(0, 1, 0, 1), MapGenerationMode::Random)
            .await
            .unwrap();
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(Chunk::is_well_formed));
        assert_eq!(store.chunk_writes(), 4);

        let second = chunks
            .get_or_create_range(lobby, range(0, 1, 0, 1), MapGenerationMode::Random)
            .await
            .unwrap();
        assert_eq!(store.chunk_writes(), 4);
        for chunk in &first {
            assert!(second.contains(chunk));
        }
    }

    #[tokio::test]
    async fn concurrent_requests_generate_at_most_once() {
        let (store, chunks) = setup();
        let chunks = Arc::new(chunks);
        let lobby = LobbyId::new();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let chunks = Arc::clone(&chunks);
            tasks.push(tokio::spawn(async move {
                chunks
                    .get_or_create(lobby, ChunkCoord::new(3, -3), MapGenerationMode::Random)
                    .await
                    .unwrap()
            }));
        }
        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }
        assert_eq!(store.chunk_writes(), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn oversized_and_inverted_ranges() {
        let (store, chunks) = setup();
        let lobby = LobbyId::new();

        let err = chunks
            .get_or_create_range(lobby, range(0, 8, 0, 8), MapGenerationMode::Empty)
            .await
            .unwrap_err();
        assert!(matches!(err, MapError::RangeTooLarge { requested: 81, .. }));

        let empty = chunks
            .get_or_create_range(lobby, range(2, 1, 0, 0), MapGenerationMode::Empty)
            .await
            .unwrap();
        assert!(empty.is_empty());
        assert_eq!(store.chunk_writes(), 0);
    }

    #[tokio::test]
    async fn malformed_grid_is_regenerated() {
        let (store, chunks) = setup();
        let lobby = LobbyId::new();
        let broken = Chunk {
            chunk_x: 0,
            chunk_y: 0,
            tiles: vec![vec![Tile::new(TileType::Stone, 1.0); 3]; 3],
        };
        store.put_chunk(lobby, &broken).await.unwrap();

        let chunk = chunks
            .get_or_create(lobby, ChunkCoord::new(0, 0), MapGenerationMode::Empty)
            .await
            .unwrap();
        assert!(chunk.is_well_formed());
        let stored = store.get_chunk(lobby, ChunkCoord::new(0, 0)).await.unwrap().unwrap();
        assert!(stored.is_well_formed());
    }

    #[tokio::test]
    async fn patch_changes_only_named_fields() {
        let (store, chunks) = setup();
        let lobby = LobbyId::new();
        let coord = ChunkCoord::new(1, 1);
        let before = chunks
            .get_or_create(lobby, coord, MapGenerationMode::Random)
            .await
            .unwrap();

        let patch = TilePatch {
            color: Some(String::from("#fff")),
            ..TilePatch::default()
        };
        let tile = chunks.patch_tile(lobby, coord, 5, 7, &patch).await.unwrap();
        assert_eq!(tile.color, "#fff");
        assert_eq!(tile.tile_type, before.tiles[7][5].tile_type);
        assert!((tile.height - before.tiles[7][5].height).abs() < f64::EPSILON);

        let after = store.get_chunk(lobby, coord).await.unwrap().unwrap();
        for (y, row) in after.tiles.iter().enumerate() {
            for (x, t) in row.iter().enumerate() {
                if (x, y) != (5, 7) {
                    assert_eq!(t, &before.tiles[y][x]);
                }
            }
        }
    }

    #[tokio::test]
    async fn patch_on_missing_chunk_creates_grass() {
        let (store, chunks) = setup();
        let lobby = LobbyId::new();
        let patch = TilePatch {
            tile_type: Some(TileType::Road),
            ..TilePatch::default()
        };
        chunks
            .patch_tile(lobby, ChunkCoord::new(-4, 9), 0, 31, &patch)
            .await
            .unwrap();

        let chunk = store
            .get_chunk(lobby, ChunkCoord::new(-4, 9))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk.tiles[31][0].tile_type, TileType::Road);
        assert_eq!(chunk.tiles[0][0].tile_type, TileType::Grass);
    }

    #[tokio::test]
    async fn out_of_range_patch_touches_nothing() {
        let (store, chunks) = setup();
        let lobby = LobbyId::new();
        for (x, y) in [(32, 0), (0, 32), (-1, 0), (0, -1)] {
            let err = chunks
                .patch_tile(lobby, ChunkCoord::new(0, 0), x, y, &TilePatch::default())
                .await
                .unwrap_err();
            assert!(matches!(err, MapError::TileOutOfRange { .. }));
        }
        assert_eq!(store.chunk_writes(), 0);
    }

    #[tokio::test]
    async fn concurrent_patches_on_one_chunk_all_land() {
        let (store, chunks) = setup();
        let chunks = Arc::new(chunks);
        let lobby = LobbyId::new();
        let coord = ChunkCoord::new(0, 0);

        let mut tasks = Vec::new();
        for i in 0..16_i64 {
            let chunks = Arc::clone(&chunks);
            tasks.push(tokio::spawn(async move {
                let patch = TilePatch {
                    tile_type: Some(TileType::Stone),
                    ..TilePatch::default()
                };
                chunks.patch_tile(lobby, coord, i, i, &patch).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let chunk = store.get_chunk(lobby, coord).await.unwrap().unwrap();
        for i in 0..16 {
            assert_eq!(chunk.tiles[i][i].tile_type, TileType::Stone);
        }
    }

    #[tokio::test]
    async fn failed_write_surfaces_storage_error() {
        let (store, chunks) = setup();
        store.set_writes_disabled(true);
        let err = chunks
            .get_or_create(LobbyId::new(), ChunkCoord::new(0, 0), MapGenerationMode::Empty)
            .await
            .unwrap_err();
        assert!(matches!(err, MapError::Storage(_)));
    }
}
