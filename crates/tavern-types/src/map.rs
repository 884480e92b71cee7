//! Map records: tiles, chunks, markers and the per-lobby map state blob.
//!
//! The map is an unbounded grid split into square chunks of
//! [`CHUNK_SIZE`] tiles. Chunks are the unit of generation and storage;
//! a chunk's grid is addressed as `tiles[tile_y][tile_x]`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Edge length of a chunk, in tiles.
pub const CHUNK_SIZE: usize = 32;

/// Default width recorded in a freshly created [`MapState`].
pub const DEFAULT_MAP_WIDTH: u32 = 10;

/// Default height recorded in a freshly created [`MapState`].
pub const DEFAULT_MAP_HEIGHT: u32 = 10;

// ---------------------------------------------------------------------------
// Tiles
// ---------------------------------------------------------------------------

/// Terrain kind of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum TileType {
    /// Open grassland. The default terrain.
    Grass,
    /// Woodland.
    Forest,
    /// A building.
    House,
    /// Impassable water; also used for the world border.
    Water,
    /// Bare rock.
    Stone,
    /// A dirt road.
    Road,
}

impl TileType {
    /// Display color used when a tile of this type is generated.
    pub const fn default_color(self) -> &'static str {
        match self {
            Self::Grass => "#4caf50",
            Self::Forest => "#2e7d32",
            Self::House => "#8d6e63",
            Self::Water => "#1e88e5",
            Self::Stone => "#9e9e9e",
            Self::Road => "#bcaaa4",
        }
    }
}

/// One cell of a chunk grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Tile {
    /// Terrain kind.
    #[serde(rename = "type")]
    pub tile_type: TileType,
    /// CSS color string.
    pub color: String,
    /// Render height.
    pub height: f64,
}

impl Tile {
    /// Build a tile of the given type with its default color.
    pub fn new(tile_type: TileType, height: f64) -> Self {
        Self {
            tile_type,
            color: tile_type.default_color().to_owned(),
            height,
        }
    }
}

/// Partial tile update. Only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TilePatch {
    /// New terrain kind.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tile_type: Option<TileType>,
    /// New color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// New height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl TilePatch {
    /// Overwrite the named fields of `tile`, leaving the rest untouched.
    pub fn apply(&self, tile: &mut Tile) {
        if let Some(tile_type) = self.tile_type {
            tile.tile_type = tile_type;
        }
        if let Some(color) = &self.color {
            tile.color.clone_from(color);
        }
        if let Some(height) = self.height {
            tile.height = height;
        }
    }
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

/// Integer coordinate of a chunk in chunk space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct ChunkCoord {
    /// Horizontal chunk index.
    pub chunk_x: i32,
    /// Vertical chunk index.
    pub chunk_y: i32,
}

impl ChunkCoord {
    /// Construct a coordinate.
    pub const fn new(chunk_x: i32, chunk_y: i32) -> Self {
        Self { chunk_x, chunk_y }
    }
}

impl core::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.chunk_x, self.chunk_y)
    }
}

/// A square block of tiles belonging to one lobby's map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Chunk {
    /// Horizontal chunk index.
    pub chunk_x: i32,
    /// Vertical chunk index.
    pub chunk_y: i32,
    /// Row-major grid, `tiles[tile_y][tile_x]`.
    pub tiles: Vec<Vec<Tile>>,
}

impl Chunk {
    /// The chunk's coordinate.
    pub const fn coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.chunk_x, self.chunk_y)
    }

    /// Whether the grid is exactly [`CHUNK_SIZE`] x [`CHUNK_SIZE`].
    pub fn is_well_formed(&self) -> bool {
        self.tiles.len() == CHUNK_SIZE && self.tiles.iter().all(|row| row.len() == CHUNK_SIZE)
    }

    /// Mutable access to one tile, if the indices are inside the grid.
    pub fn tile_mut(&mut self, tile_x: usize, tile_y: usize) -> Option<&mut Tile> {
        self.tiles.get_mut(tile_y).and_then(|row| row.get_mut(tile_x))
    }
}

/// Tile-selection policy for never-before-seen chunks, fixed per lobby.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum MapGenerationMode {
    /// Plain grass everywhere.
    #[default]
    Empty,
    /// Independent random terrain per tile.
    Random,
    /// Random interior terrain inside a water border at the world edge.
    ProceduralBordered,
}

impl MapGenerationMode {
    /// Stable string form, as stored in the lobby record.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Random => "random",
            Self::ProceduralBordered => "procedural-bordered",
        }
    }

    /// Parse the stored string form. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "empty" => Some(Self::Empty),
            "random" => Some(Self::Random),
            "procedural-bordered" => Some(Self::ProceduralBordered),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// A point annotation on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Marker {
    /// Position-derived id (`count_before_insert + 1`). Not unique after deletions.
    pub id: u64,
    /// Horizontal position in world units.
    pub x: f64,
    /// Vertical position in world units.
    pub y: f64,
    /// Free-form marker kind chosen by the client (e.g. `"token"`, `"poi"`).
    #[serde(rename = "type")]
    pub marker_type: String,
    /// Username of the participant who placed the marker.
    pub created_by: String,
}

/// Per-lobby map blob: dimensions metadata plus the marker list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MapState {
    /// Nominal width, informational only.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Nominal height, informational only.
    #[serde(default = "default_height")]
    pub height: u32,
    /// Markers in append order.
    #[serde(default)]
    pub markers: Vec<Marker>,
}

const fn default_width() -> u32 {
    DEFAULT_MAP_WIDTH
}

const fn default_height() -> u32 {
    DEFAULT_MAP_HEIGHT
}

impl Default for MapState {
    fn default() -> Self {
        Self {
            width: DEFAULT_MAP_WIDTH,
            height: DEFAULT_MAP_HEIGHT,
            markers: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;

    fn grass_chunk() -> Chunk {
        Chunk {
            chunk_x: 0,
            chunk_y: 0,
            tiles: vec![vec![Tile::new(TileType::Grass, 1.0); CHUNK_SIZE]; CHUNK_SIZE],
        }
    }

    #[test]
    fn patch_only_touches_named_fields() {
        let mut tile = Tile::new(TileType::Forest, 1.02);
        let patch = TilePatch {
            color: Some(String::from("#fff")),
            ..TilePatch::default()
        };
        patch.apply(&mut tile);
        assert_eq!(tile.color, "#fff");
        assert_eq!(tile.tile_type, TileType::Forest);
        assert_eq!(tile.height, 1.02);
    }

    #[test]
    fn tile_type_serializes_under_type_key() {
        let json = serde_json::to_value(Tile::new(TileType::Water, 0.5)).unwrap();
        assert_eq!(json["type"], "water");
        assert_eq!(json["color"], "#1e88e5");
    }

    #[test]
    fn malformed_grid_is_detected() {
        let mut chunk = grass_chunk();
        assert!(chunk.is_well_formed());
        chunk.tiles.pop();
        assert!(!chunk.is_well_formed());

        let mut ragged = grass_chunk();
        ragged.tiles[3].push(Tile::new(TileType::Grass, 1.0));
        assert!(!ragged.is_well_formed());
    }

    #[test]
    fn tile_mut_addresses_row_then_column() {
        let mut chunk = grass_chunk();
        chunk.tile_mut(3, 4).unwrap().height = 2.0;
        assert_eq!(chunk.tiles[4][3].height, 2.0);
        assert!(chunk.tile_mut(CHUNK_SIZE, 0).is_none());
        assert!(chunk.tile_mut(0, CHUNK_SIZE).is_none());
    }

    #[test]
    fn generation_mode_string_forms() {
        for mode in [
            MapGenerationMode::Empty,
            MapGenerationMode::Random,
            MapGenerationMode::ProceduralBordered,
        ] {
            assert_eq!(MapGenerationMode::parse(mode.as_str()), Some(mode));
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
        assert_eq!(MapGenerationMode::parse("islands"), None);
    }

    #[test]
    fn map_state_fills_missing_fields() {
        let state: MapState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, MapState::default());
    }

    #[test]
    fn marker_uses_type_key() {
        let marker = Marker {
            id: 1,
            x: 2.5,
            y: -1.0,
            marker_type: String::from("token"),
            created_by: String::from("gm"),
        };
        let json = serde_json::to_value(&marker).unwrap();
        assert_eq!(json["type"], "token");
    }
}
