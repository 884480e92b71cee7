//! Error types for the map engine.

use tavern_db::DbError;

/// Errors produced by chunk and marker operations.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Tile indices fall outside `[0, CHUNK_SIZE)`.
    #[error("tile ({tile_x}, {tile_y}) is outside the chunk")]
    TileOutOfRange {
        /// Requested column.
        tile_x: i64,
        /// Requested row.
        tile_y: i64,
    },

    /// A range request names more chunks than one request may fetch.
    #[error("range covers {requested} chunks, at most {max} allowed")]
    RangeTooLarge {
        /// Number of coordinates in the requested rectangle.
        requested: u64,
        /// The per-request cap.
        max: u64,
    },

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}
