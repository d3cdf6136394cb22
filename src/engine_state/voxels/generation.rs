//! # Terrain Generation Module
//!
//! Selects how brand-new chunks are filled. Generation is deterministic: the same
//! generator settings and chunk index always yield the same chunk, so a chunk that is
//! evicted without edits can simply be regenerated later.

use serde::{Deserialize, Serialize};

use super::block::block_type::BlockType;
use super::chunk::{Chunk, ChunkDimensions};
use super::chunk_index::ChunkIndex;
use crate::error::{StreamingError, StreamingResult};

/// Default seed for Perlin terrain.
pub const PERLIN_SEED: u32 = 0;
/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;
/// Samples with an absolute value above this threshold become solid.
pub const PERLIN_THRESHOLD: f64 = 0.2;

/// The method used to generate new chunks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum TerrainGenerator {
    /// 3D Perlin noise, natural-looking terrain with caves and overhangs.
    Perlin { seed: u32, scale: f64, threshold: f64 },
    /// Every column filled up to `height`.
    Flat { height: usize },
    /// Alternating solid and empty cells.
    Checkerboard,
    /// Completely solid chunks.
    Solid,
    /// Completely empty chunks.
    Empty,
}

impl Default for TerrainGenerator {
    fn default() -> Self {
        TerrainGenerator::Perlin {
            seed: PERLIN_SEED,
            scale: PERLIN_SCALE_FACTOR,
            threshold: PERLIN_THRESHOLD,
        }
    }
}

impl TerrainGenerator {
    /// Generates the chunk at `index`.
    pub fn generate(&self, index: ChunkIndex, dims: ChunkDimensions) -> StreamingResult<Chunk> {
        let chunk = match *self {
            TerrainGenerator::Perlin {
                seed,
                scale,
                threshold,
            } => {
                if !scale.is_finite() || !threshold.is_finite() {
                    return Err(StreamingError::Generation {
                        index,
                        reason: format!("non-finite noise parameters {} / {}", scale, threshold),
                    });
                }
                Chunk::perlin(index, dims, seed, scale, threshold)
            }
            TerrainGenerator::Flat { height } => Chunk::flat(index, dims, height),
            TerrainGenerator::Checkerboard => Chunk::checkerboard(index, dims),
            TerrainGenerator::Solid => Chunk::solid(index, dims, BlockType::DIRT),
            TerrainGenerator::Empty => Chunk::empty(index, dims),
        };
        Ok(chunk)
    }
}
