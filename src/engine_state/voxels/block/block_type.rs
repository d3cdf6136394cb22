//! # Block Type Module
//!
//! The block types the built-in terrain generators know how to place.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::BlockTypeSize;

/// Enumerates the built-in block types.
///
/// `AIR` exists for hosts that round-trip raw values; chunks never store it, an
/// empty slot is `None`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize)]
pub enum BlockType {
    /// Non-solid, transparent.
    AIR,
    DIRT,
    GRASS,
    WOOD,
    STONE,
    WHITE,
}

impl BlockType {
    /// Converts a raw `BlockTypeSize` to a `BlockType`, if one exists.
    pub fn from_int(btype: BlockTypeSize) -> Option<Self> {
        FromPrimitive::from_u8(btype)
    }

    /// Picks a solid terrain block type (excluding `AIR` and `WHITE`) from `rng`.
    ///
    /// Generators pass a chunk-seeded generator so the same chunk always produces
    /// the same blocks.
    pub fn random_terrain_type(rng: &mut fastrand::Rng) -> Self {
        match rng.u8(1..5) {
            1 => BlockType::DIRT,
            2 => BlockType::GRASS,
            3 => BlockType::WOOD,
            _ => BlockType::STONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_int() {
        assert_eq!(BlockType::from_int(0), Some(BlockType::AIR));
        assert_eq!(BlockType::from_int(4), Some(BlockType::STONE));
        assert_eq!(BlockType::from_int(200), None);
    }

    #[test]
    fn test_random_terrain_type_is_solid_and_seeded() {
        let mut a = fastrand::Rng::with_seed(7);
        let mut b = fastrand::Rng::with_seed(7);
        for _ in 0..64 {
            let t = BlockType::random_terrain_type(&mut a);
            assert_ne!(t, BlockType::AIR);
            assert_ne!(t, BlockType::WHITE);
            assert_eq!(t, BlockType::random_terrain_type(&mut b));
        }
    }
}
