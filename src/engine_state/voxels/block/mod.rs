//! # Block Module
//!
//! Block-level data for the voxel world: the placed-cell record, the known block
//! types and the six block faces used for visibility queries.

use block_type::BlockType;

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory.
pub type BlockTypeSize = u8;

/// A single placed block.
///
/// A cell has no identity beyond the chunk slot holding it. Empty slots are
/// represented by `None` in the chunk's dense storage, never by a special block type.
///
/// # Memory Layout
/// The `#[repr(C)]` attribute keeps the layout stable so hosts can copy cells
/// straight into their own buffers.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq, Eq, Hash)]
pub struct VoxelCell {
    /// The type of this block, encoded as a `BlockTypeSize` for compact storage.
    pub block_type: BlockTypeSize,
}

impl VoxelCell {
    /// Creates a new cell of the specified type.
    pub fn new(block_type: BlockType) -> Self {
        VoxelCell {
            block_type: block_type as BlockTypeSize,
        }
    }

    /// Creates a cell from a raw block type value, including values without a
    /// `BlockType` variant (host-defined blocks).
    pub fn from_raw(block_type: BlockTypeSize) -> Self {
        VoxelCell { block_type }
    }

    /// The block type, if the raw value names a known variant.
    pub fn kind(&self) -> Option<BlockType> {
        BlockType::from_int(self.block_type)
    }
}

impl From<BlockType> for VoxelCell {
    fn from(block_type: BlockType) -> Self {
        VoxelCell::new(block_type)
    }
}
