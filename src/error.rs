//! # Error Module
//!
//! Recoverable failures surfaced by the streaming core. Contract violations
//! (out-of-range local chunk coordinates, malformed slices) are not represented
//! here: they panic at the call site.

use std::time::Duration;

use thiserror::Error;

use crate::engine_state::voxels::chunk_index::{ChunkIndex, Direction};

/// Errors produced by the world streamer and its collaborators.
#[derive(Debug, Error)]
pub enum StreamingError {
    /// The addressed world position maps to a chunk outside the loaded window.
    #[error("Chunk {index} is not loaded")]
    ChunkNotLoaded { index: ChunkIndex },
    /// The addressed world position is above or below the chunk column.
    #[error("Height {y} is outside the chunk column")]
    OutsideVerticalRange { y: i32 },
    /// A configuration value failed validation.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    /// A configuration document could not be parsed.
    #[error("Malformed config: {0}")]
    ConfigParse(#[from] serde_json::Error),
    /// Terrain generation failed for a chunk.
    #[error("Generation of chunk {index} failed: {reason}")]
    Generation { index: ChunkIndex, reason: String },
    /// A persistence collaborator failed to load or save a chunk.
    #[error("Persistence of chunk {index} failed: {reason}")]
    Persistence { index: ChunkIndex, reason: String },
    /// A shift waited for a preloaded slice longer than the configured stall timeout.
    #[error("Preload for {direction:?} stalled after {} ms", .waited.as_millis())]
    PreloadStalled { direction: Direction, waited: Duration },
    /// The preload pipeline has been shut down and can no longer produce slices.
    #[error("Preload pipeline is shut down")]
    PipelineShutDown,
    /// A preload worker thread could not be started.
    #[error("Could not start preload worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

impl StreamingError {
    /// Whether the caller can retry the operation later and expect it to succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StreamingError::ChunkNotLoaded { .. } => true,
            StreamingError::OutsideVerticalRange { .. } => false,
            StreamingError::InvalidConfig(_) => false,
            StreamingError::ConfigParse(_) => false,
            StreamingError::Generation { .. } => true,
            StreamingError::Persistence { .. } => true,
            StreamingError::PreloadStalled { .. } => true,
            StreamingError::PipelineShutDown => false,
            StreamingError::WorkerSpawn(_) => false,
        }
    }
}

/// Result alias used throughout the crate.
pub type StreamingResult<T> = Result<T, StreamingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_and_sources() {
        let stalled = StreamingError::PreloadStalled {
            direction: Direction::East,
            waited: Duration::from_millis(300),
        };
        assert_eq!(stalled.to_string(), "Preload for East stalled after 300 ms");
        assert!(stalled.is_recoverable());

        let parse: StreamingError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(parse, StreamingError::ConfigParse(_)));
        assert!(std::error::Error::source(&parse).is_some());
        assert!(!parse.is_recoverable());

        let spawn: StreamingError = std::io::Error::other("no threads").into();
        assert_eq!(spawn.to_string(), "Could not start preload worker: no threads");
    }
}
