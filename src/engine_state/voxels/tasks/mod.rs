//! # Voxel Task System
//!
//! Work scheduled on the preload workers: producing the slices the grid will need
//! next, off the tick thread.

pub mod slice_preload_task;
