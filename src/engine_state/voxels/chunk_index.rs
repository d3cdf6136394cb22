//! # Chunk Index Module
//!
//! Chunk-grid coordinates and the four cardinal streaming directions.
//!
//! A `ChunkIndex` addresses a whole chunk column in chunk units (not voxel units).
//! World voxel coordinates map to a chunk index by Euclidean integer division by the
//! chunk size, so negative coordinates land in the chunk "below" zero rather than
//! being truncated towards it.

use std::fmt;

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use super::chunk::ChunkDimensions;

/// Position of a chunk in the world, in chunk units along X and Z.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChunkIndex {
    pub x: i32,
    pub z: i32,
}

impl ChunkIndex {
    pub const fn new(x: i32, z: i32) -> Self {
        ChunkIndex { x, z }
    }

    /// Maps a world voxel position to the index of the chunk containing it.
    pub fn from_voxel(voxel: Point3<i32>, dims: ChunkDimensions) -> Self {
        ChunkIndex {
            x: voxel.x.div_euclid(dims.x as i32),
            z: voxel.z.div_euclid(dims.z as i32),
        }
    }

    /// Returns the index `steps` chunks away in `direction`.
    pub fn step(self, direction: Direction, steps: i32) -> Self {
        let (dx, dz) = direction.delta();
        ChunkIndex {
            x: self.x + dx * steps,
            z: self.z + dz * steps,
        }
    }

    /// Component of this index along `axis`.
    pub fn along(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Z => self.z,
        }
    }

    /// World voxel coordinate of this chunk's local origin.
    pub fn voxel_origin(self, dims: ChunkDimensions) -> Point3<i32> {
        Point3::new(self.x * dims.x as i32, 0, self.z * dims.z as i32)
    }
}

impl fmt::Display for ChunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Horizontal axis of the chunk grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Z,
}

impl Axis {
    /// The other horizontal axis.
    pub fn orthogonal(self) -> Axis {
        match self {
            Axis::X => Axis::Z,
            Axis::Z => Axis::X,
        }
    }
}

/// One of the four cardinal streaming directions.
///
/// North and South move along Z (`-Z` and `+Z`), East and West along X (`+X` and `-X`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North = 0,
    South = 1,
    East = 2,
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Axis this direction moves along.
    pub fn axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::Z,
            Direction::East | Direction::West => Axis::X,
        }
    }

    /// `+1` if the direction increases its axis coordinate, `-1` otherwise.
    pub fn sign(self) -> i32 {
        match self {
            Direction::South | Direction::East => 1,
            Direction::North | Direction::West => -1,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Unit step `(dx, dz)` in chunk units.
    pub fn delta(self) -> (i32, i32) {
        match self.axis() {
            Axis::X => (self.sign(), 0),
            Axis::Z => (0, self.sign()),
        }
    }

    /// Direction of travel needed to move from coordinate `from` to `to` along `axis`.
    pub fn towards(axis: Axis, from: i32, to: i32) -> Option<Direction> {
        match (axis, to.cmp(&from)) {
            (_, std::cmp::Ordering::Equal) => None,
            (Axis::X, std::cmp::Ordering::Greater) => Some(Direction::East),
            (Axis::X, std::cmp::Ordering::Less) => Some(Direction::West),
            (Axis::Z, std::cmp::Ordering::Greater) => Some(Direction::South),
            (Axis::Z, std::cmp::Ordering::Less) => Some(Direction::North),
        }
    }
}
