//! # Voxel Streamer
//!
//! Streams an effectively infinite voxel world through a finite window of chunks
//! centred on a moving observer.
//!
//! The window is a square of `world_size x world_size` chunk columns. When the
//! observer crosses a chunk boundary the window shifts one chunk towards it: the
//! slice at the rear is detached and a slice produced ahead of time by background
//! workers is attached at the front. Renderers, edit sources and persistence hosts
//! talk to the world only through `WorldStreamer`.
//!
//! ## Key Modules
//!
//! * `config` - Window sizing, worker pool and retry settings
//! * `core` - Shared concurrency primitives
//! * `engine_state` - Chunks, the chunk grid, the preload pipeline and the worker pool
//! * `error` - The crate error type
//!
//! ## Usage
//!
//! ```no_run
//! use cgmath::Point3;
//! use voxel_streamer::{ChunkIndex, StreamingConfig, WorldStreamer};
//!
//! voxel_streamer::init_logger();
//! let mut streamer = WorldStreamer::from_config(StreamingConfig::default(), ChunkIndex::new(0, 0))?;
//! loop {
//!     let observer = Point3::new(0.0, 32.0, 0.0);
//!     streamer.tick(observer)?;
//!     for (index, chunk) in streamer.loaded_chunks() {
//!         // hand chunks to the mesher
//!         # let _ = (index, chunk);
//!     }
//!     # break;
//! }
//! # Ok::<(), voxel_streamer::StreamingError>(())
//! ```

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

pub use config::StreamingConfig;
pub use engine_state::streaming::stats::StreamingStats;
pub use engine_state::streaming::{CubeQuery, TickReport, WorldStreamer};
pub use engine_state::voxels::block::block_type::BlockType;
pub use engine_state::voxels::block::VoxelCell;
pub use engine_state::voxels::chunk::{Chunk, ChunkDimensions};
pub use engine_state::voxels::chunk_index::{ChunkIndex, Direction};
pub use engine_state::voxels::generation::TerrainGenerator;
pub use engine_state::voxels::loader::{ChunkLoader, StoreBackedLoader};
pub use engine_state::voxels::persistence::{ChunkStore, MemoryChunkStore};
pub use error::{StreamingError, StreamingResult};

/// Sends `log` output to stdout, filtered by `RUST_LOG`. Does nothing if a logger is
/// already installed.
pub fn init_logger() {
    let mut log_builder = env_logger::Builder::new();
    let initialized = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init()
        .is_ok();

    if initialized {
        log::info!("Logger initialized");
    }
}
