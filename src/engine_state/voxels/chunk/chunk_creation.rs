//! # Chunk Creation Module
//!
//! A builder that fills a chunk's dense storage in linear order (Z fastest, then Y,
//! then X), the order `Chunk::local_index` defines. Generators and loaders push one
//! cell per slot instead of computing offsets themselves.

use crate::engine_state::voxels::block::{block_type::BlockType, VoxelCell};
use crate::engine_state::voxels::chunk_index::ChunkIndex;

use super::{Chunk, ChunkDimensions};

/// Builds a `Chunk` one cell at a time.
pub struct ChunkBuilder {
    index: ChunkIndex,
    dims: ChunkDimensions,
    cells: Vec<Option<VoxelCell>>,
}

impl ChunkBuilder {
    pub fn new(index: ChunkIndex, dims: ChunkDimensions) -> Self {
        ChunkBuilder {
            index,
            dims,
            cells: Vec::with_capacity(dims.volume()),
        }
    }

    /// Appends the next cell in linear order.
    ///
    /// # Panics
    /// Panics if the chunk is already full.
    pub fn push_cell(&mut self, cell: Option<VoxelCell>) {
        assert!(
            self.cells.len() < self.dims.volume(),
            "chunk {} already holds {} cells",
            self.index,
            self.dims.volume()
        );
        self.cells.push(cell);
    }

    /// Appends a block of `block_type`; `AIR` leaves the slot empty.
    pub fn push_block_type(&mut self, block_type: BlockType) {
        if block_type == BlockType::AIR {
            self.push_cell(None);
        } else {
            self.push_cell(Some(VoxelCell::new(block_type)));
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cells.len() == self.dims.volume()
    }

    /// Finalizes the chunk. Slots that were never pushed are empty.
    pub fn build(mut self) -> Chunk {
        self.cells.resize(self.dims.volume(), None);
        Chunk {
            index: self.index,
            dims: self.dims,
            cells: self.cells,
            dirty: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_order_matches_local_index() {
        let dims = ChunkDimensions::new(2, 3, 4);
        let mut builder = ChunkBuilder::new(ChunkIndex::new(0, 0), dims);
        for i in 0..dims.volume() {
            builder.push_cell(Some(VoxelCell::from_raw(i as u8)));
        }
        assert!(builder.is_complete());
        let chunk = builder.build();
        for i in 0..dims.volume() {
            let p = chunk.local_coords(i);
            assert_eq!(chunk.get(p.x, p.y, p.z), Some(VoxelCell::from_raw(i as u8)));
        }
    }

    #[test]
    fn test_short_builder_pads_with_empty() {
        let dims = ChunkDimensions::new(2, 2, 2);
        let mut builder = ChunkBuilder::new(ChunkIndex::new(0, 0), dims);
        builder.push_block_type(BlockType::DIRT);
        builder.push_block_type(BlockType::AIR);
        let chunk = builder.build();
        assert_eq!(chunk.occupied_count(), 1);
        assert_eq!(chunk.get(0, 0, 0), Some(VoxelCell::new(BlockType::DIRT)));
    }

    #[test]
    #[should_panic(expected = "already holds")]
    fn test_overfull_builder_panics() {
        let dims = ChunkDimensions::new(1, 1, 1);
        let mut builder = ChunkBuilder::new(ChunkIndex::new(0, 0), dims);
        builder.push_cell(None);
        builder.push_cell(None);
    }
}
