//! # Configuration Module
//!
//! Sizing and timing for one streamed world. Defaults come from the constants below;
//! an embedding host may override them from JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine_state::voxels::chunk::ChunkDimensions;
use crate::engine_state::voxels::generation::TerrainGenerator;
use crate::error::{StreamingError, StreamingResult};

/// Side length of the loaded window, in chunks.
pub const WORLD_SIZE: usize = 7;
/// Number of slices preloaded ahead of each edge of the window.
pub const PRELOAD_SIZE: usize = 3;
/// Default chunk dimensions in voxels.
pub const CHUNK_DIMENSIONS: ChunkDimensions = ChunkDimensions::new(16, 64, 16);
/// World units per voxel; observer positions are divided by this before mapping to chunks.
pub const VOXEL_SIZE: f32 = 1.0;
/// Maximum number of preload tasks handed to one worker before further tasks queue locally.
pub const MAX_TASKS_IN_FLIGHT: usize = 2;

/// Backoff applied when a preload producer fails to load a chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_backoff_ms: 10,
            max_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): doubles each attempt up to the
    /// maximum, with up to 25% random jitter added.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        let jitter = if base >= 4 { fastrand::u64(0..=base / 4) } else { 0 };
        Duration::from_millis(base + jitter)
    }
}

/// Configuration for a `WorldStreamer`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Window side length in chunks; odd and at least 3.
    pub world_size: usize,
    /// Lookahead depth per direction; at least 1.
    pub preload_size: usize,
    pub chunk_dimensions: ChunkDimensions,
    pub voxel_size: f32,
    pub worker_count: usize,
    pub max_tasks_in_flight: usize,
    pub retry: RetryPolicy,
    /// How long a shift may wait for a preloaded slice before the tick gives up.
    pub stall_timeout_ms: u64,
    /// How often a stalled shift wakes up to service the worker pool.
    pub poll_interval_ms: u64,
    pub generator: TerrainGenerator,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        StreamingConfig {
            world_size: WORLD_SIZE,
            preload_size: PRELOAD_SIZE,
            chunk_dimensions: CHUNK_DIMENSIONS,
            voxel_size: VOXEL_SIZE,
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_tasks_in_flight: MAX_TASKS_IN_FLIGHT,
            retry: RetryPolicy::default(),
            stall_timeout_ms: 5_000,
            poll_interval_ms: 5,
            generator: TerrainGenerator::default(),
        }
    }
}

impl StreamingConfig {
    /// Parses a JSON document; missing fields keep their defaults. The result is
    /// validated.
    pub fn from_json_str(json: &str) -> StreamingResult<Self> {
        let config: StreamingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StreamingResult<()> {
        if self.world_size < 3 || self.world_size % 2 == 0 {
            return Err(StreamingError::InvalidConfig(format!(
                "world_size must be odd and at least 3, got {}",
                self.world_size
            )));
        }
        if self.preload_size == 0 {
            return Err(StreamingError::InvalidConfig(
                "preload_size must be at least 1".to_string(),
            ));
        }
        let d = self.chunk_dimensions;
        if d.x == 0 || d.y == 0 || d.z == 0 {
            return Err(StreamingError::InvalidConfig(format!(
                "chunk dimensions must be positive, got {:?}",
                d
            )));
        }
        if !(self.voxel_size.is_finite() && self.voxel_size > 0.0) {
            return Err(StreamingError::InvalidConfig(format!(
                "voxel_size must be positive, got {}",
                self.voxel_size
            )));
        }
        if self.worker_count == 0 || self.max_tasks_in_flight == 0 {
            return Err(StreamingError::InvalidConfig(
                "worker_count and max_tasks_in_flight must be at least 1".to_string(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(StreamingError::InvalidConfig(format!(
                "initial backoff {} ms exceeds maximum {} ms",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            )));
        }
        Ok(())
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StreamingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.world_size, 7);
        assert_eq!(config.preload_size, 3);
    }

    #[test]
    fn test_rejects_even_or_small_world() {
        for world_size in [1, 2, 4] {
            let config = StreamingConfig {
                world_size,
                ..StreamingConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(StreamingError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_preload_and_empty_chunks() {
        let config = StreamingConfig {
            preload_size: 0,
            ..StreamingConfig::default()
        };
        assert!(config.validate().is_err());

        let config = StreamingConfig {
            chunk_dimensions: ChunkDimensions::new(16, 0, 16),
            ..StreamingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_keeps_defaults() {
        let config = StreamingConfig::from_json_str(
            r#"{ "world_size": 5, "generator": { "method": "checkerboard" } }"#,
        )
        .unwrap();
        assert_eq!(config.world_size, 5);
        assert_eq!(config.preload_size, PRELOAD_SIZE);
        assert_eq!(config.generator, TerrainGenerator::Checkerboard);

        assert!(StreamingConfig::from_json_str(r#"{ "world_size": 4 }"#).is_err());
        assert!(StreamingConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryPolicy {
            initial_backoff_ms: 8,
            max_backoff_ms: 40,
        };
        let first = retry.backoff(1).as_millis();
        assert!((8..=10).contains(&first));
        let third = retry.backoff(3).as_millis();
        assert!((32..=40).contains(&third));
        let capped = retry.backoff(30).as_millis();
        assert!((40..=50).contains(&capped));
    }
}
