//! # Chunk Grid Module
//!
//! The sliding window of loaded chunks around the observer.
//!
//! ## Layout
//!
//! The grid is a `world_size x world_size` square of chunks stored as columns:
//! the outer sequence runs along world X (index 0 is the western edge) and each
//! column runs along world Z (index 0 is the northern edge). The chunk at the
//! centre of the square is the `middle_index`.
//!
//! ## Shifting
//!
//! `shift(direction, slice)` moves the whole window one chunk towards `direction`:
//! the trailing slice (the row or column at the rear) is detached and returned,
//! everything else moves one position towards the rear, and the supplied slice
//! becomes the new leading edge. The same code path serves all four directions;
//! only the axis and sign differ.

use std::collections::VecDeque;

use cgmath::Point3;

use super::block::block_side::{BlockSide, FaceMask};
use super::block::VoxelCell;
use super::chunk::{Chunk, ChunkDimensions};
use super::chunk_index::{Axis, ChunkIndex, Direction};

/// One row or column of chunks, orthogonal to a movement direction.
///
/// Chunks are ordered by ascending coordinate along the slice's own axis.
#[derive(Debug)]
pub struct Slice {
    chunks: Vec<Chunk>,
}

impl Slice {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Slice { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Index of the first chunk, if any.
    pub fn origin(&self) -> Option<ChunkIndex> {
        self.chunks.first().map(Chunk::index)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    /// Whether this slice is exactly the `len` chunks starting at `origin` and running
    /// along `axis`.
    pub fn is_aligned(&self, origin: ChunkIndex, axis: Axis, len: usize) -> bool {
        self.chunks.len() == len
            && self
                .chunks
                .iter()
                .enumerate()
                .all(|(i, chunk)| chunk.index() == origin.step(ascending(axis), i as i32))
    }
}

/// The direction in which coordinates along `axis` increase.
pub fn ascending(axis: Axis) -> Direction {
    match axis {
        Axis::X => Direction::East,
        Axis::Z => Direction::South,
    }
}

/// Moves `incoming` into the leading end of `deque` and returns what fell off the
/// trailing end. A positive `sign` leads at the back.
fn shift_deque<T>(deque: &mut VecDeque<T>, sign: i32, incoming: T) -> T {
    if sign > 0 {
        let trailing = std::mem::replace(&mut deque[0], incoming);
        deque.rotate_left(1);
        trailing
    } else {
        let last = deque.len() - 1;
        let trailing = std::mem::replace(&mut deque[last], incoming);
        deque.rotate_right(1);
        trailing
    }
}

/// A square window of chunks centred on `middle_index`.
pub struct ChunkGrid {
    world_size: usize,
    dims: ChunkDimensions,
    middle_index: ChunkIndex,
    columns: VecDeque<VecDeque<Chunk>>,
}

impl ChunkGrid {
    /// Builds a grid from its columns, west to east, each ordered north to south.
    ///
    /// # Panics
    /// Panics if `world_size` is not odd, or if the columns do not cover exactly the
    /// window centred on `middle_index`.
    pub fn from_columns(middle_index: ChunkIndex, world_size: usize, columns: Vec<Slice>) -> Self {
        assert!(
            world_size % 2 == 1,
            "world size must be odd, got {}",
            world_size
        );
        assert_eq!(columns.len(), world_size, "grid needs one column per row");

        let half = (world_size / 2) as i32;
        let mut dims = None;
        let mut grid_columns = VecDeque::with_capacity(world_size);
        for (i, column) in columns.into_iter().enumerate() {
            let origin = ChunkIndex::new(middle_index.x - half + i as i32, middle_index.z - half);
            assert!(
                column.is_aligned(origin, Axis::Z, world_size),
                "column {} does not start at {}",
                i,
                origin
            );
            for chunk in column.chunks() {
                let d = *dims.get_or_insert(chunk.dims());
                assert_eq!(d, chunk.dims(), "mixed chunk dimensions in grid");
            }
            grid_columns.push_back(VecDeque::from(column.into_chunks()));
        }

        ChunkGrid {
            world_size,
            // world_size >= 1 so at least one chunk was seen
            dims: dims.unwrap_or(ChunkDimensions::new(1, 1, 1)),
            middle_index,
            columns: grid_columns,
        }
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    pub fn dims(&self) -> ChunkDimensions {
        self.dims
    }

    /// The chunk index currently at the centre of the window.
    pub fn middle_index(&self) -> ChunkIndex {
        self.middle_index
    }

    fn half(&self) -> i32 {
        (self.world_size / 2) as i32
    }

    /// Number of chunks held; always `world_size * world_size`.
    pub fn len(&self) -> usize {
        self.columns.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `index` lies within `middle_index ± world_size / 2` on both axes.
    pub fn contains(&self, index: ChunkIndex) -> bool {
        let half = self.half();
        (index.x - self.middle_index.x).abs() <= half && (index.z - self.middle_index.z).abs() <= half
    }

    fn slot(&self, index: ChunkIndex) -> Option<(usize, usize)> {
        if !self.contains(index) {
            return None;
        }
        let half = self.half();
        Some((
            (index.x - self.middle_index.x + half) as usize,
            (index.z - self.middle_index.z + half) as usize,
        ))
    }

    /// The chunk at `index`, or `None` if it lies outside the window.
    pub fn chunk_at(&self, index: ChunkIndex) -> Option<&Chunk> {
        let (column, row) = self.slot(index)?;
        self.columns.get(column)?.get(row)
    }

    pub fn chunk_at_mut(&mut self, index: ChunkIndex) -> Option<&mut Chunk> {
        let (column, row) = self.slot(index)?;
        self.columns.get_mut(column)?.get_mut(row)
    }

    /// Iterates the loaded chunks column by column, west to east.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.columns.iter().flat_map(|column| column.iter())
    }

    pub fn chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.columns.iter_mut().flat_map(|column| column.iter_mut())
    }

    /// Index of the first chunk of the slice `distance` chunks beyond the edge facing
    /// `direction`. Distance 1 is the slice the next `shift(direction)` needs.
    pub fn slice_origin(&self, direction: Direction, distance: i32) -> ChunkIndex {
        let half = self.half();
        let axis = direction.axis();
        let edge = self.middle_index.along(axis) + direction.sign() * (half + distance);
        let start = self.middle_index.along(axis.orthogonal()) - half;
        match axis {
            Axis::X => ChunkIndex::new(edge, start),
            Axis::Z => ChunkIndex::new(start, edge),
        }
    }

    /// Whether `slice` is the one `shift(direction)` would accept right now.
    pub fn accepts(&self, direction: Direction, slice: &Slice) -> bool {
        slice.is_aligned(
            self.slice_origin(direction, 1),
            direction.axis().orthogonal(),
            self.world_size,
        )
    }

    /// Moves the window one chunk towards `direction`.
    ///
    /// `incoming` becomes the new leading edge; the detached trailing slice is
    /// returned in ascending order. The window and `middle_index` change together.
    ///
    /// # Panics
    /// Panics if `incoming` is not the slice immediately beyond the leading edge.
    pub fn shift(&mut self, direction: Direction, incoming: Slice) -> Slice {
        assert!(
            self.accepts(direction, &incoming),
            "slice starting at {:?} does not border the {:?} edge of the window around {}",
            incoming.origin(),
            direction,
            self.middle_index
        );

        let sign = direction.sign();
        let trailing = match direction.axis() {
            Axis::X => {
                let column = VecDeque::from(incoming.into_chunks());
                Vec::from(shift_deque(&mut self.columns, sign, column))
            }
            Axis::Z => self
                .columns
                .iter_mut()
                .zip(incoming.into_chunks())
                .map(|(column, chunk)| shift_deque(column, sign, chunk))
                .collect(),
        };

        self.middle_index = self.middle_index.step(direction, 1);
        Slice::new(trailing)
    }

    /// Splits a world voxel position into its chunk index and local coordinates.
    /// Returns `None` if the height is outside the chunk column.
    pub fn locate(&self, voxel: Point3<i32>) -> Option<(ChunkIndex, Point3<usize>)> {
        locate(voxel, self.dims)
    }

    /// The occupant at a world voxel position: `None` if the position is not loaded,
    /// `Some(None)` if loaded and empty.
    pub fn cell_at(&self, voxel: Point3<i32>) -> Option<Option<VoxelCell>> {
        let (index, local) = self.locate(voxel)?;
        let chunk = self.chunk_at(index)?;
        Some(chunk.get(local.x, local.y, local.z))
    }

    fn is_occupied(&self, voxel: Point3<i32>) -> bool {
        matches!(self.cell_at(voxel), Some(Some(_)))
    }

    /// Render-candidate faces of the block at a world voxel position, resolving
    /// neighbours across chunk borders. Neighbours outside the window count as empty.
    /// Returns `None` if the position itself is not loaded.
    pub fn visible_face_mask(&self, voxel: Point3<i32>) -> Option<FaceMask> {
        let (index, local) = self.locate(voxel)?;
        let chunk = self.chunk_at(index)?;
        let mut mask = chunk.visible_face_mask(local.x, local.y, local.z);

        for side in mask.sides() {
            let normal = side.normal();
            let n = Point3::new(
                local.x as i32 + normal.x,
                local.y as i32 + normal.y,
                local.z as i32 + normal.z,
            );
            let crosses_border = !self.dims.contains(n.x, n.y, n.z);
            if crosses_border && side != BlockSide::TOP && side != BlockSide::BOTTOM {
                let neighbour = voxel + normal;
                if self.is_occupied(neighbour) {
                    mask.remove(side);
                }
            }
        }
        Some(mask)
    }
}

/// Splits a world voxel position into its chunk index and local coordinates.
pub fn locate(voxel: Point3<i32>, dims: ChunkDimensions) -> Option<(ChunkIndex, Point3<usize>)> {
    if voxel.y < 0 || voxel.y as usize >= dims.y {
        return None;
    }
    let index = ChunkIndex::from_voxel(voxel, dims);
    let local = Point3::new(
        voxel.x.rem_euclid(dims.x as i32) as usize,
        voxel.y as usize,
        voxel.z.rem_euclid(dims.z as i32) as usize,
    );
    Some((index, local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_type::BlockType;

    const DIMS: ChunkDimensions = ChunkDimensions::new(4, 4, 4);

    fn slice_at(origin: ChunkIndex, axis: Axis, len: usize) -> Slice {
        Slice::new(
            (0..len)
                .map(|i| Chunk::empty(origin.step(ascending(axis), i as i32), DIMS))
                .collect(),
        )
    }

    fn grid(middle: ChunkIndex, world_size: usize) -> ChunkGrid {
        let half = (world_size / 2) as i32;
        let columns = (0..world_size as i32)
            .map(|i| {
                slice_at(
                    ChunkIndex::new(middle.x - half + i, middle.z - half),
                    Axis::Z,
                    world_size,
                )
            })
            .collect();
        ChunkGrid::from_columns(middle, world_size, columns)
    }

    fn assert_window_consistent(grid: &ChunkGrid) {
        assert_eq!(grid.len(), grid.world_size() * grid.world_size());
        let half = (grid.world_size() / 2) as i32;
        let m = grid.middle_index();
        for x in m.x - half..=m.x + half {
            for z in m.z - half..=m.z + half {
                let index = ChunkIndex::new(x, z);
                assert_eq!(grid.chunk_at(index).map(Chunk::index), Some(index));
            }
        }
    }

    fn shift(grid: &mut ChunkGrid, direction: Direction) -> Slice {
        let origin = grid.slice_origin(direction, 1);
        let incoming = slice_at(origin, direction.axis().orthogonal(), grid.world_size());
        grid.shift(direction, incoming)
    }

    #[test]
    fn test_chunk_at_outside_window_is_a_miss() {
        let grid = grid(ChunkIndex::new(0, 0), 3);
        assert!(grid.chunk_at(ChunkIndex::new(1, -1)).is_some());
        assert!(grid.chunk_at(ChunkIndex::new(2, 0)).is_none());
        assert!(grid.chunk_at(ChunkIndex::new(0, -2)).is_none());
        assert_window_consistent(&grid);
    }

    #[test]
    fn test_shift_east_detaches_west_column() {
        let mut grid = grid(ChunkIndex::new(0, 0), 3);
        assert_eq!(grid.slice_origin(Direction::East, 1), ChunkIndex::new(2, -1));

        let trailing = shift(&mut grid, Direction::East);

        assert_eq!(grid.middle_index(), ChunkIndex::new(1, 0));
        let detached: Vec<_> = trailing.chunks().iter().map(Chunk::index).collect();
        assert_eq!(
            detached,
            vec![
                ChunkIndex::new(-1, -1),
                ChunkIndex::new(-1, 0),
                ChunkIndex::new(-1, 1)
            ]
        );
        assert_window_consistent(&grid);
    }

    #[test]
    fn test_shift_north_detaches_south_row() {
        let mut grid = grid(ChunkIndex::new(0, 0), 3);
        let trailing = shift(&mut grid, Direction::North);
        assert_eq!(grid.middle_index(), ChunkIndex::new(0, -1));
        let detached: Vec<_> = trailing.chunks().iter().map(Chunk::index).collect();
        assert_eq!(
            detached,
            vec![
                ChunkIndex::new(-1, 1),
                ChunkIndex::new(0, 1),
                ChunkIndex::new(1, 1)
            ]
        );
        assert_window_consistent(&grid);
    }

    #[test]
    fn test_middle_index_matches_sum_of_shifts() {
        let mut grid = grid(ChunkIndex::new(2, -3), 5);
        let path = [
            Direction::East,
            Direction::East,
            Direction::South,
            Direction::West,
            Direction::North,
            Direction::North,
            Direction::North,
            Direction::East,
            Direction::South,
        ];
        let mut expected = ChunkIndex::new(2, -3);
        for direction in path {
            shift(&mut grid, direction);
            expected = expected.step(direction, 1);
            assert_eq!(grid.middle_index(), expected);
            assert_window_consistent(&grid);
        }
    }

    #[test]
    fn test_edits_travel_with_their_chunk() {
        let mut grid = grid(ChunkIndex::new(0, 0), 3);
        let target = ChunkIndex::new(1, 1);
        grid.chunk_at_mut(target)
            .unwrap()
            .set(0, 0, 0, VoxelCell::new(BlockType::WOOD));

        shift(&mut grid, Direction::South);
        shift(&mut grid, Direction::East);

        let chunk = grid.chunk_at(target).unwrap();
        assert_eq!(chunk.get(0, 0, 0), Some(VoxelCell::new(BlockType::WOOD)));
    }

    #[test]
    #[should_panic(expected = "does not border")]
    fn test_shift_rejects_misaligned_slice() {
        let mut grid = grid(ChunkIndex::new(0, 0), 3);
        let wrong = slice_at(ChunkIndex::new(3, -1), Axis::Z, 3);
        grid.shift(Direction::East, wrong);
    }

    #[test]
    fn test_locate_negative_voxels() {
        let (index, local) = locate(Point3::new(-1, 2, -5), DIMS).unwrap();
        assert_eq!(index, ChunkIndex::new(-1, -2));
        assert_eq!(local, Point3::new(3, 2, 3));
        assert!(locate(Point3::new(0, 4, 0), DIMS).is_none());
        assert!(locate(Point3::new(0, -1, 0), DIMS).is_none());
    }

    fn place(grid: &mut ChunkGrid, voxel: Point3<i32>, cell: VoxelCell) {
        let (index, local) = grid.locate(voxel).unwrap();
        grid.chunk_at_mut(index)
            .unwrap()
            .set(local.x, local.y, local.z, cell);
    }

    #[test]
    fn test_visible_face_mask_crosses_chunk_borders() {
        let mut grid = grid(ChunkIndex::new(0, 0), 3);
        let dirt = VoxelCell::new(BlockType::DIRT);
        // Two blocks either side of the border between chunk (0,0) and (1,0).
        let a = Point3::new(3, 1, 1);
        let b = Point3::new(4, 1, 1);
        place(&mut grid, a, dirt);
        place(&mut grid, b, dirt);

        let mask_a = grid.visible_face_mask(a).unwrap();
        assert!(!mask_a.contains(BlockSide::BACK));
        assert_eq!(mask_a.count(), 5);

        let mask_b = grid.visible_face_mask(b).unwrap();
        assert!(!mask_b.contains(BlockSide::FRONT));

        // Nothing is loaded east of the window's eastern edge.
        let edge = Point3::new(7, 1, 1);
        place(&mut grid, edge, dirt);
        assert_eq!(grid.visible_face_mask(edge), Some(FaceMask::ALL));
        assert_eq!(grid.visible_face_mask(Point3::new(8, 1, 1)), None);
    }
}
