//! # Chunk Iteration Module
//!
//! An iterator over the occupied cells of a chunk, for meshers and persistence.

use cgmath::Point3;

use crate::engine_state::voxels::block::VoxelCell;

use super::Chunk;

/// Iterates the occupied cells of a chunk in linear storage order, yielding each
/// cell's local coordinates alongside it.
pub struct OccupiedCells<'a> {
    chunk_ref: &'a Chunk,
    /// Next linear offset to inspect.
    current_offset: usize,
}

impl<'a> OccupiedCells<'a> {
    pub fn new(chunk_ref: &'a Chunk) -> Self {
        OccupiedCells {
            chunk_ref,
            current_offset: 0,
        }
    }
}

impl<'a> Iterator for OccupiedCells<'a> {
    type Item = (Point3<usize>, VoxelCell);

    fn next(&mut self) -> Option<Self::Item> {
        let cells = self.chunk_ref.cells();
        while self.current_offset < cells.len() {
            let offset = self.current_offset;
            self.current_offset += 1;
            if let Some(cell) = cells[offset] {
                return Some((self.chunk_ref.local_coords(offset), cell));
            }
        }
        None
    }
}
