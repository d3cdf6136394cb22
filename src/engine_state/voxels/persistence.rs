//! # Persistence Module
//!
//! The boundary to whatever keeps chunks alive between visits. The streamer saves a
//! chunk when it is destroyed and the default loader checks the store before
//! generating. Storage formats are the store implementation's business.

use std::num::NonZeroUsize;

use lru::LruCache;

use super::chunk::Chunk;
use super::chunk_index::ChunkIndex;
use crate::core::MtResource;
use crate::error::StreamingResult;

/// Persisted chunk storage keyed by `ChunkIndex`.
///
/// Implementations are shared between the preload workers (`load`) and the tick
/// thread (`save`), so they must be thread-safe.
pub trait ChunkStore: Send + Sync {
    /// Returns the persisted chunk at `index`, or `None` if nothing was saved there.
    fn load(&self, index: ChunkIndex) -> StreamingResult<Option<Chunk>>;

    /// Persists the full contents of `chunk`, replacing any earlier snapshot.
    fn save(&self, chunk: &Chunk) -> StreamingResult<()>;
}

/// Default number of snapshots a `MemoryChunkStore` keeps.
pub const MEMORY_STORE_CAPACITY: usize = 4096;

/// In-memory chunk store bounded by least-recently-used eviction.
///
/// Snapshots beyond the capacity are forgotten, so the oldest edits are lost first.
pub struct MemoryChunkStore {
    chunks: MtResource<LruCache<ChunkIndex, Chunk>>,
}

impl MemoryChunkStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        MemoryChunkStore {
            chunks: MtResource::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: ChunkIndex) -> bool {
        self.chunks.get().contains(&index)
    }
}

impl Default for MemoryChunkStore {
    fn default() -> Self {
        MemoryChunkStore::new(MEMORY_STORE_CAPACITY)
    }
}

impl ChunkStore for MemoryChunkStore {
    fn load(&self, index: ChunkIndex) -> StreamingResult<Option<Chunk>> {
        Ok(self.chunks.get_mut().get(&index).cloned())
    }

    fn save(&self, chunk: &Chunk) -> StreamingResult<()> {
        let mut snapshot = chunk.clone();
        snapshot.mark_clean();
        if let Some((evicted, _)) = self.chunks.get_mut().push(chunk.index(), snapshot) {
            if evicted != chunk.index() {
                log::debug!("Memory store full, forgot chunk {}", evicted);
            }
        }
        Ok(())
    }
}
