//! Chunk generation.
//!
//! Pure functions from `(coordinate, mode, rng)` to a full
//! [`CHUNK_SIZE`] x [`CHUNK_SIZE`] grid. The default entry point draws
//! from the thread-local RNG, so regenerating a coordinate does not
//! reproduce earlier terrain.

use rand::Rng;
use tavern_types::{CHUNK_SIZE, Chunk, ChunkCoord, MapGenerationMode, Tile, TileType};

/// Largest chunk index (in absolute value) inside the bordered world.
pub const WORLD_CHUNK_RADIUS: i32 = 8;

/// Width of the water band along the bordered world's outer edge, in tiles.
pub const BORDER_TILES: i64 = 4;

/// Height of border water tiles.
pub const WATER_HEIGHT: f64 = 0.2;

/// Base height of land tiles before jitter.
const BASE_HEIGHT: f64 = 1.0;

/// Maximum absolute height jitter applied to land tiles.
const HEIGHT_JITTER: f64 = 0.05;

/// Cumulative `(threshold, type)` draws for `random` mode. Anything above
/// the last threshold is grass.
const RANDOM_WEIGHTS: [(f64, TileType); 2] = [(0.10, TileType::Forest), (0.12, TileType::House)];

/// Cumulative draws for the interior of `procedural-bordered` mode.
const BORDERED_WEIGHTS: [(f64, TileType); 2] =
    [(0.15, TileType::Forest), (0.18, TileType::House)];

#[allow(clippy::cast_possible_wrap)]
const CHUNK_SIZE_I64: i64 = CHUNK_SIZE as i64;

/// Generate a chunk with the thread-local RNG.
pub fn generate_chunk(coord: ChunkCoord, mode: MapGenerationMode) -> Chunk {
    generate_chunk_with(coord, mode, &mut rand::rng())
}

/// Generate a chunk drawing from `rng`.
pub fn generate_chunk_with(
    coord: ChunkCoord,
    mode: MapGenerationMode,
    rng: &mut impl Rng,
) -> Chunk {
    let origin_x = i64::from(coord.chunk_x).saturating_mul(CHUNK_SIZE_I64);
    let origin_y = i64::from(coord.chunk_y).saturating_mul(CHUNK_SIZE_I64);

    let tiles = (0..CHUNK_SIZE_I64)
        .map(|ty| {
            (0..CHUNK_SIZE_I64)
                .map(|tx| match mode {
                    MapGenerationMode::Empty => land(TileType::Grass, rng),
                    MapGenerationMode::Random => land(pick(&RANDOM_WEIGHTS, rng), rng),
                    MapGenerationMode::ProceduralBordered => {
                        if is_border(origin_x.saturating_add(tx), origin_y.saturating_add(ty)) {
                            Tile::new(TileType::Water, WATER_HEIGHT)
                        } else {
                            land(pick(&BORDERED_WEIGHTS, rng), rng)
                        }
                    }
                })
                .collect()
        })
        .collect();

    Chunk {
        chunk_x: coord.chunk_x,
        chunk_y: coord.chunk_y,
        tiles,
    }
}

/// Whether the world tile at `(x, y)` lies in (or beyond) the border band.
pub fn is_border(x: i64, y: i64) -> bool {
    let radius = i64::from(WORLD_CHUNK_RADIUS);
    let first = radius.saturating_neg().saturating_mul(CHUNK_SIZE_I64);
    let last = radius
        .saturating_add(1)
        .saturating_mul(CHUNK_SIZE_I64)
        .saturating_sub(1);
    let near_edge =
        |v: i64| v < first.saturating_add(BORDER_TILES) || v > last.saturating_sub(BORDER_TILES);
    near_edge(x) || near_edge(y)
}

fn land(tile_type: TileType, rng: &mut impl Rng) -> Tile {
    Tile::new(
        tile_type,
        BASE_HEIGHT + rng.random_range(-HEIGHT_JITTER..=HEIGHT_JITTER),
    )
}

fn pick(weights: &[(f64, TileType)], rng: &mut impl Rng) -> TileType {
    let roll: f64 = rng.random();
    weights
        .iter()
        .find(|(threshold, _)| roll < *threshold)
        .map_or(TileType::Grass, |(_, tile_type)| *tile_type)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn tiles(chunk: &Chunk) -> impl Iterator<Item = &Tile> {
        chunk.tiles.iter().flatten()
    }

    #[test]
    fn every_mode_yields_a_full_grid() {
        let mut rng = StdRng::seed_from_u64(7);
        for mode in [
            MapGenerationMode::Empty,
            MapGenerationMode::Random,
            MapGenerationMode::ProceduralBordered,
        ] {
            let chunk = generate_chunk_with(ChunkCoord::new(-3, 5), mode, &mut rng);
            assert!(chunk.is_well_formed(), "{mode:?}");
            assert_eq!(chunk.coord(), ChunkCoord::new(-3, 5));
        }
    }

    #[test]
    fn empty_mode_is_jittered_grass() {
        let mut rng = StdRng::seed_from_u64(1);
        let chunk = generate_chunk_with(ChunkCoord::new(0, 0), MapGenerationMode::Empty, &mut rng);
        for tile in tiles(&chunk) {
            assert_eq!(tile.tile_type, TileType::Grass);
            assert_eq!(tile.color, TileType::Grass.default_color());
            assert!((tile.height - 1.0).abs() <= HEIGHT_JITTER + f64::EPSILON);
        }
    }

    #[test]
    fn random_mode_mixes_terrain() {
        let mut rng = StdRng::seed_from_u64(42);
        let chunk = generate_chunk_with(ChunkCoord::new(2, 2), MapGenerationMode::Random, &mut rng);
        let forest = tiles(&chunk)
            .filter(|t| t.tile_type == TileType::Forest)
            .count();
        let grass = tiles(&chunk)
            .filter(|t| t.tile_type == TileType::Grass)
            .count();
        // 1024 tiles at 10% forest / 88% grass.
        assert!((50..160).contains(&forest), "forest = {forest}");
        assert!(grass > 800, "grass = {grass}");
        assert!(tiles(&chunk).all(|t| t.tile_type != TileType::Water));
    }

    #[test]
    fn bordered_mode_walls_the_world_edge() {
        let mut rng = StdRng::seed_from_u64(3);
        let edge = ChunkCoord::new(-WORLD_CHUNK_RADIUS, 0);
        let chunk = generate_chunk_with(edge, MapGenerationMode::ProceduralBordered, &mut rng);
        for row in &chunk.tiles {
            for tile in &row[..4] {
                assert_eq!(tile.tile_type, TileType::Water);
                assert!((tile.height - WATER_HEIGHT).abs() < f64::EPSILON);
            }
            assert_ne!(row[4].tile_type, TileType::Water);
        }

        let centre = generate_chunk_with(
            ChunkCoord::new(0, 0),
            MapGenerationMode::ProceduralBordered,
            &mut rng,
        );
        assert!(tiles(&centre).all(|t| t.tile_type != TileType::Water));
    }

    #[test]
    fn beyond_the_world_is_all_water() {
        let mut rng = StdRng::seed_from_u64(9);
        let outside = ChunkCoord::new(WORLD_CHUNK_RADIUS + 1, 0);
        let chunk = generate_chunk_with(outside, MapGenerationMode::ProceduralBordered, &mut rng);
        assert!(tiles(&chunk).all(|t| t.tile_type == TileType::Water));
    }

    #[test]
    fn border_band_bounds() {
        let max = (i64::from(WORLD_CHUNK_RADIUS) + 1) * 32 - 1;
        assert!(is_border(max, 0));
        assert!(is_border(max - 3, 0));
        assert!(!is_border(max - 4, 0));
        assert!(!is_border(0, 0));
        assert!(is_border(0, -i64::from(WORLD_CHUNK_RADIUS) * 32));
    }
}
