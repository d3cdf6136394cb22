//! # Engine State Module
//!
//! The streaming engine behind `WorldStreamer`.
//!
//! ## Key Components
//!
//! * `streaming` - The orchestrator, its preload pipeline and statistics
//! * `task_management` - Worker threads that run preload work off the tick thread
//! * `voxels` - Chunk storage, the chunk grid, generation and persistence
//!
//! ## Threading
//!
//! Everything that touches the chunk grid runs on the thread calling
//! `WorldStreamer::tick`. Workers only ever see the chunks they are producing and the
//! queue entry they will complete.

pub mod streaming;
pub mod task_management;
pub mod voxels;
