//! # Loader Module
//!
//! Produces the chunks the preload pipeline hands to the grid. Whether a chunk comes
//! from persisted storage or fresh generation is decided here; the pipeline only sees
//! a finished chunk or an error.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::chunk::{Chunk, ChunkDimensions};
use super::chunk_index::ChunkIndex;
use super::generation::TerrainGenerator;
use super::persistence::ChunkStore;
use crate::error::{StreamingError, StreamingResult};

/// Produces the chunk at a given index. Called from preload worker threads.
pub trait ChunkLoader: Send + Sync {
    fn load_chunk(&self, index: ChunkIndex, dims: ChunkDimensions) -> StreamingResult<Chunk>;
}

/// Calls `loader` for `index` and checks that it returned the chunk asked for. A
/// panicking loader is reported as a failed load, so callers can retry it like any
/// other failure.
pub fn load_checked(
    loader: &dyn ChunkLoader,
    index: ChunkIndex,
    dims: ChunkDimensions,
) -> StreamingResult<Chunk> {
    let chunk = panic::catch_unwind(AssertUnwindSafe(|| loader.load_chunk(index, dims)))
        .unwrap_or_else(|_| {
            Err(StreamingError::Generation {
                index,
                reason: "loader panicked".to_string(),
            })
        })?;
    if chunk.index() != index || chunk.dims() != dims {
        return Err(StreamingError::Generation {
            index,
            reason: format!(
                "loader returned chunk {} with size {:?}",
                chunk.index(),
                chunk.dims()
            ),
        });
    }
    Ok(chunk)
}

/// Loads persisted chunks when a store has them and generates the rest.
pub struct StoreBackedLoader {
    generator: TerrainGenerator,
    store: Option<Arc<dyn ChunkStore>>,
}

impl StoreBackedLoader {
    pub fn new(generator: TerrainGenerator, store: Option<Arc<dyn ChunkStore>>) -> Self {
        StoreBackedLoader { generator, store }
    }
}

impl ChunkLoader for StoreBackedLoader {
    fn load_chunk(&self, index: ChunkIndex, dims: ChunkDimensions) -> StreamingResult<Chunk> {
        if let Some(store) = &self.store {
            if let Some(chunk) = store.load(index)? {
                if chunk.dims() != dims || chunk.index() != index {
                    return Err(StreamingError::Persistence {
                        index,
                        reason: format!(
                            "stored chunk {} has size {:?}, expected {:?}",
                            chunk.index(),
                            chunk.dims(),
                            dims
                        ),
                    });
                }
                log::trace!("Loaded chunk {} from store", index);
                return Ok(chunk);
            }
        }
        self.generator.generate(index, dims)
    }
}
