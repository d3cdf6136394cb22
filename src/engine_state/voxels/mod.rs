//! # Voxel World
//!
//! Data and producers for the streamed voxel world.
//!
//! ## Architecture
//!
//! * **Block**: The placed-cell record, block types and block faces
//! * **Chunk**: Fixed-size dense 3D arrays of cells, the unit of streaming
//! * **ChunkIndex**: Chunk coordinates and the four streaming directions
//! * **Grid**: The sliding window of chunks around the observer
//! * **Generation** and **Loader**: Where new chunks come from
//! * **Persistence**: Where edited chunks go when they leave the window
//! * **Tasks**: Slice production run on the preload workers
//!
//! ## Thread Safety
//!
//! Chunks are plain owned values. A chunk belongs to the worker producing it, then
//! to a preload queue, then to exactly one grid slot; it is moved between owners,
//! never shared.

pub mod block;
pub mod chunk;
pub mod chunk_index;
pub mod generation;
pub mod grid;
pub mod loader;
pub mod persistence;
pub mod tasks;
