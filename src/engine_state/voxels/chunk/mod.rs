//! # Chunk Module
//!
//! This module provides the `Chunk` struct: a fixed-size dense 3D array of optional
//! voxel cells, the unit the world streams in and out.
//!
//! ## Storage
//!
//! Every slot is stored explicitly, addressed by a computed linear offset:
//!
//! ```text
//! local_index(x, y, z) = x * size_y * size_z + y * size_z + z
//! ```
//!
//! so Z varies fastest and X slowest. An empty slot is `None`; there is no sparse map
//! and no "air" block stored in a slot.
//!
//! ## Bounds
//!
//! Local coordinates must satisfy `0 <= x < size_x`, `0 <= y < size_y`,
//! `0 <= z < size_z`. Addressing a cell outside the chunk is a programming error and
//! panics; neighbour lookups that may step outside use `is_occupied_local`, which
//! treats the outside as empty.

use cgmath::{Point3, Vector3};
use chunk_creation::ChunkBuilder;
use chunk_iteration::OccupiedCells;
use noise::NoiseFn;
use noise::Perlin;
use serde::{Deserialize, Serialize};

use super::block::block_side::{BlockSide, FaceMask};
use super::block::block_type::BlockType;
use super::block::VoxelCell;
use super::chunk_index::ChunkIndex;

pub mod chunk_creation;
pub mod chunk_iteration;

/// Size of a chunk in voxels along each axis. Fixed per world instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkDimensions {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl ChunkDimensions {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        ChunkDimensions { x, y, z }
    }

    /// Total number of cells in a chunk.
    pub fn volume(&self) -> usize {
        self.x * self.y * self.z
    }

    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.x
            && (y as usize) < self.y
            && (z as usize) < self.z
    }
}

/// A fixed-size column of voxel cells at one `ChunkIndex`.
///
/// A chunk is owned by exactly one place at a time: a pending-slice queue while it is
/// preloaded, then one slot of the chunk grid once promoted. It moves between them,
/// it is never copied by the streamer.
#[derive(Clone, Debug)]
pub struct Chunk {
    index: ChunkIndex,
    dims: ChunkDimensions,
    cells: Vec<Option<VoxelCell>>,
    /// Set by any edit after creation, cleared once the chunk has been persisted.
    dirty: bool,
}

impl Chunk {
    /// Creates a completely empty chunk.
    pub fn empty(index: ChunkIndex, dims: ChunkDimensions) -> Self {
        Chunk {
            index,
            dims,
            cells: vec![None; dims.volume()],
            dirty: false,
        }
    }

    /// Creates a chunk with every cell filled with `block_type`.
    pub fn solid(index: ChunkIndex, dims: ChunkDimensions, block_type: BlockType) -> Self {
        let mut builder = ChunkBuilder::new(index, dims);
        for _ in 0..dims.volume() {
            builder.push_block_type(block_type);
        }
        builder.build()
    }

    /// Creates a chunk whose cells below `height` are filled (grass on top, dirt
    /// below, stone at the bottom layer).
    pub fn flat(index: ChunkIndex, dims: ChunkDimensions, height: usize) -> Self {
        let mut builder = ChunkBuilder::new(index, dims);
        for _ in 0..dims.x {
            for y in 0..dims.y {
                for _ in 0..dims.z {
                    let block_type = if y >= height {
                        BlockType::AIR
                    } else if y == 0 {
                        BlockType::STONE
                    } else if y + 1 == height {
                        BlockType::GRASS
                    } else {
                        BlockType::DIRT
                    };
                    builder.push_block_type(block_type);
                }
            }
        }
        builder.build()
    }

    /// Creates a chunk with a 3D checkerboard pattern (for testing).
    ///
    /// The pattern is anchored to world coordinates so it continues seamlessly
    /// across chunk borders.
    pub fn checkerboard(index: ChunkIndex, dims: ChunkDimensions) -> Self {
        let origin = index.voxel_origin(dims);
        let mut builder = ChunkBuilder::new(index, dims);
        for x in 0..dims.x as i32 {
            for y in 0..dims.y as i32 {
                for z in 0..dims.z as i32 {
                    let parity = (origin.x + x + y + origin.z + z).rem_euclid(2);
                    if parity == 0 {
                        builder.push_block_type(BlockType::DIRT);
                    } else {
                        builder.push_block_type(BlockType::AIR);
                    }
                }
            }
        }
        builder.build()
    }

    /// Generates a chunk using 3D Perlin noise for natural-looking terrain.
    ///
    /// Noise is sampled at world voxel coordinates scaled by `scale`; samples outside
    /// `[-threshold, threshold]` become solid, which yields terrain with caves and
    /// overhangs. Block types are drawn from a generator seeded by `seed` and the
    /// chunk index, so the same chunk always generates identically.
    pub fn perlin(
        index: ChunkIndex,
        dims: ChunkDimensions,
        seed: u32,
        scale: f64,
        threshold: f64,
    ) -> Self {
        let perlin = Perlin::new(seed);
        let mut rng = fastrand::Rng::with_seed(Self::chunk_seed(seed, index));
        let origin = index.voxel_origin(dims);
        let mut builder = ChunkBuilder::new(index, dims);

        for i in 0..dims.x as i32 {
            for j in 0..dims.y as i32 {
                for k in 0..dims.z as i32 {
                    let bposition = Point3::new(origin.x + i, j, origin.z + k);
                    let perlin_sample = perlin.get(Self::to_perlin_pos(bposition, scale));
                    if !(-threshold..=threshold).contains(&perlin_sample) {
                        builder.push_block_type(BlockType::random_terrain_type(&mut rng));
                    } else {
                        builder.push_block_type(BlockType::AIR);
                    }
                }
            }
        }

        builder.build()
    }

    fn to_perlin_pos(pos: Point3<i32>, scale_factor: f64) -> [f64; 3] {
        [
            (pos.x as f64 * scale_factor),
            (pos.y as f64 * scale_factor),
            (pos.z as f64 * scale_factor),
        ]
    }

    fn chunk_seed(seed: u32, index: ChunkIndex) -> u64 {
        let x = index.x as u32 as u64;
        let z = index.z as u32 as u64;
        (seed as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (x << 32 | z)
    }

    pub fn index(&self) -> ChunkIndex {
        self.index
    }

    pub fn dims(&self) -> ChunkDimensions {
        self.dims
    }

    /// Whether the chunk has been edited since it was created or last persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Linear offset of the cell at `(x, y, z)`.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    pub fn local_index(&self, x: usize, y: usize, z: usize) -> usize {
        assert!(
            x < self.dims.x && y < self.dims.y && z < self.dims.z,
            "local coordinate ({}, {}, {}) outside chunk of size {:?}",
            x,
            y,
            z,
            self.dims
        );
        x * self.dims.y * self.dims.z + y * self.dims.z + z
    }

    /// Inverse of `local_index`.
    ///
    /// # Panics
    /// Panics if `index` is not smaller than the chunk volume.
    pub fn local_coords(&self, index: usize) -> Point3<usize> {
        assert!(
            index < self.cells.len(),
            "linear index {} outside chunk of volume {}",
            index,
            self.cells.len()
        );
        let z = index % self.dims.z;
        let rest = index / self.dims.z;
        let y = rest % self.dims.y;
        let x = rest / self.dims.y;
        Point3::new(x, y, z)
    }

    /// The occupant of `(x, y, z)`, or `None` if the slot is empty.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<VoxelCell> {
        self.cells[self.local_index(x, y, z)]
    }

    /// Places `cell` at `(x, y, z)`, returning the previous occupant.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    pub fn set(&mut self, x: usize, y: usize, z: usize, cell: VoxelCell) -> Option<VoxelCell> {
        let i = self.local_index(x, y, z);
        self.dirty = true;
        self.cells[i].replace(cell)
    }

    /// Clears `(x, y, z)`, returning the previous occupant. Clearing an empty slot is
    /// a no-op.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    pub fn remove(&mut self, x: usize, y: usize, z: usize) -> Option<VoxelCell> {
        let i = self.local_index(x, y, z);
        let previous = self.cells[i].take();
        if previous.is_some() {
            self.dirty = true;
        }
        previous
    }

    /// Whether the cell at signed local coordinates is occupied; anything outside the
    /// chunk counts as empty.
    pub fn is_occupied_local(&self, x: i32, y: i32, z: i32) -> bool {
        self.dims.contains(x, y, z)
            && self.cells[self.local_index(x as usize, y as usize, z as usize)].is_some()
    }

    /// Determines which faces of the block at `(x, y, z)` are render candidates.
    ///
    /// A face is a candidate when the neighbour across it is empty or lies outside
    /// this chunk. Resolving neighbours in adjacent chunks is the grid's job. An empty
    /// cell has no faces.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    pub fn visible_face_mask(&self, x: usize, y: usize, z: usize) -> FaceMask {
        if self.get(x, y, z).is_none() {
            return FaceMask::NONE;
        }

        let position = Vector3::new(x as i32, y as i32, z as i32);
        let mut mask = FaceMask::NONE;
        for side in BlockSide::all() {
            let n = position + side.normal();
            if !self.is_occupied_local(n.x, n.y, n.z) {
                mask.insert(side);
            }
        }
        mask
    }

    /// Iterates every occupied cell with its local coordinates.
    pub fn occupied_cells(&self) -> OccupiedCells<'_> {
        OccupiedCells::new(self)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    pub(crate) fn cells(&self) -> &[Option<VoxelCell>] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: ChunkDimensions = ChunkDimensions::new(4, 6, 5);

    #[test]
    fn test_set_get_remove() {
        let mut chunk = Chunk::empty(ChunkIndex::new(0, 0), DIMS);
        let stone = VoxelCell::new(BlockType::STONE);

        assert_eq!(chunk.get(1, 2, 3), None);
        assert_eq!(chunk.set(1, 2, 3, stone), None);
        assert_eq!(chunk.get(1, 2, 3), Some(stone));
        assert!(chunk.is_dirty());

        let dirt = VoxelCell::new(BlockType::DIRT);
        assert_eq!(chunk.set(1, 2, 3, dirt), Some(stone));
        assert_eq!(chunk.remove(1, 2, 3), Some(dirt));
        assert_eq!(chunk.get(1, 2, 3), None);
        assert_eq!(chunk.remove(1, 2, 3), None);
    }

    #[test]
    fn test_every_cell_set_then_get() {
        let mut chunk = Chunk::empty(ChunkIndex::new(2, -1), DIMS);
        for x in 0..DIMS.x {
            for y in 0..DIMS.y {
                for z in 0..DIMS.z {
                    let cell = VoxelCell::from_raw((x + y + z) as u8 + 1);
                    chunk.set(x, y, z, cell);
                    assert_eq!(chunk.get(x, y, z), Some(cell));
                }
            }
        }
        assert_eq!(chunk.occupied_count(), DIMS.volume());
    }

    #[test]
    fn test_local_index_inverse() {
        let chunk = Chunk::empty(ChunkIndex::new(0, 0), DIMS);
        for i in 0..DIMS.volume() {
            let p = chunk.local_coords(i);
            assert_eq!(chunk.local_index(p.x, p.y, p.z), i);
        }
        assert_eq!(chunk.local_index(1, 0, 0), DIMS.y * DIMS.z);
        assert_eq!(chunk.local_index(0, 1, 0), DIMS.z);
        assert_eq!(chunk.local_index(0, 0, 1), 1);
    }

    #[test]
    #[should_panic(expected = "outside chunk")]
    fn test_out_of_range_get_panics() {
        let chunk = Chunk::empty(ChunkIndex::new(0, 0), DIMS);
        chunk.get(DIMS.x, 0, 0);
    }

    #[test]
    #[should_panic(expected = "outside chunk")]
    fn test_out_of_range_set_panics() {
        let mut chunk = Chunk::empty(ChunkIndex::new(0, 0), DIMS);
        chunk.set(0, 0, DIMS.z, VoxelCell::new(BlockType::DIRT));
    }

    #[test]
    fn test_visible_face_mask() {
        let mut chunk = Chunk::empty(ChunkIndex::new(0, 0), DIMS);
        let dirt = VoxelCell::new(BlockType::DIRT);

        assert_eq!(chunk.visible_face_mask(1, 1, 1), FaceMask::NONE);

        chunk.set(1, 1, 1, dirt);
        assert_eq!(chunk.visible_face_mask(1, 1, 1), FaceMask::ALL);

        chunk.set(2, 1, 1, dirt);
        chunk.set(1, 2, 1, dirt);
        let mask = chunk.visible_face_mask(1, 1, 1);
        assert!(!mask.contains(BlockSide::BACK));
        assert!(!mask.contains(BlockSide::TOP));
        assert_eq!(mask.count(), 4);

        // Faces on the chunk border always count as candidates.
        chunk.set(0, 0, 0, dirt);
        chunk.set(1, 0, 0, dirt);
        let corner = chunk.visible_face_mask(0, 0, 0);
        assert!(corner.contains(BlockSide::FRONT));
        assert!(corner.contains(BlockSide::BOTTOM));
        assert!(corner.contains(BlockSide::LEFT));
        assert!(!corner.contains(BlockSide::BACK));
    }

    #[test]
    fn test_flat_and_perlin_generation() {
        let flat = Chunk::flat(ChunkIndex::new(0, 0), DIMS, 3);
        assert_eq!(flat.get(0, 0, 0), Some(VoxelCell::new(BlockType::STONE)));
        assert_eq!(flat.get(2, 2, 4), Some(VoxelCell::new(BlockType::GRASS)));
        assert_eq!(flat.get(2, 3, 4), None);
        assert_eq!(flat.occupied_count(), DIMS.x * DIMS.z * 3);
        assert!(!flat.is_dirty());

        let a = Chunk::perlin(ChunkIndex::new(5, -3), DIMS, 11, 0.2, 0.2);
        let b = Chunk::perlin(ChunkIndex::new(5, -3), DIMS, 11, 0.2, 0.2);
        assert_eq!(a.cells(), b.cells());
    }

    #[test]
    fn test_checkerboard_continues_across_chunks() {
        let dims = ChunkDimensions::new(3, 2, 3);
        let left = Chunk::checkerboard(ChunkIndex::new(0, 0), dims);
        let right = Chunk::checkerboard(ChunkIndex::new(1, 0), dims);
        // World x = 2 and x = 3 at the same y/z must alternate.
        assert_ne!(left.get(2, 0, 0).is_some(), right.get(0, 0, 0).is_some());
    }
}
