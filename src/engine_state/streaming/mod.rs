//! # World Streaming
//!
//! Keeps the window of loaded chunks centred on a moving observer.
//!
//! ## Key Components
//!
//! * `WorldStreamer` - Owns the chunk grid and the preload pipeline, and is the only
//!   entry point external collaborators use
//! * `pipeline` - Per-direction queues of slices produced ahead of need
//! * `stats` - Counters for shifts, stalls, retries and persistence
//!
//! ## Tick
//!
//! Each `tick` maps the observer position to a chunk index. For every horizontal axis
//! where that index differs from the grid's middle index, the window shifts one chunk
//! towards the observer, using the oldest preloaded slice for that direction. A tick
//! never shifts more than once per axis, so a long jump converges over several ticks.
//!
//! The trailing slice detached by a shift is exactly the next slice the opposite
//! direction would need, so it goes to the front of that direction's queue instead of
//! being destroyed. The queues on the other axis move along with the window, trading
//! single chunks with the consumed and the recycled slice. Chunks are destroyed (and
//! persisted if edited) only once they fall out of every queue. Each shift therefore
//! issues a single slice request: the backfill for the direction of travel.
//!
//! Ticks without a shift drop queue entries that no longer line up with the window
//! and refill the queues.

pub mod pipeline;
pub mod stats;

use std::sync::Arc;

use cgmath::Point3;
use web_time::Instant;

use pipeline::PreloadPipeline;
use stats::StreamingStats;

use crate::config::StreamingConfig;
use crate::engine_state::voxels::block::block_side::FaceMask;
use crate::engine_state::voxels::block::VoxelCell;
use crate::engine_state::voxels::chunk::Chunk;
use crate::engine_state::voxels::chunk_index::{Axis, ChunkIndex, Direction};
use crate::engine_state::voxels::grid::{ascending, ChunkGrid, Slice};
use crate::engine_state::voxels::loader::{load_checked, ChunkLoader, StoreBackedLoader};
use crate::engine_state::voxels::persistence::{ChunkStore, MemoryChunkStore};
use crate::error::{StreamingError, StreamingResult};

/// The contents of a world position, as seen by `WorldStreamer::query_cube`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CubeQuery {
    Occupied(VoxelCell),
    Empty,
    /// The position's chunk is outside the loaded window.
    NotLoaded,
}

/// What a single `tick` did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Grid shifts performed (0 to 2).
    pub shifts: usize,
    /// Shifts that had to wait for their slice.
    pub stalls: u64,
    /// Middle index after the tick.
    pub middle_index: ChunkIndex,
}

/// Streams chunks in and out of a square window around an observer.
///
/// # Examples
///
/// ```no_run
/// use cgmath::Point3;
/// use voxel_streamer::{ChunkIndex, StreamingConfig, WorldStreamer};
///
/// let mut streamer = WorldStreamer::from_config(StreamingConfig::default(), ChunkIndex::new(0, 0))?;
/// let report = streamer.tick(Point3::new(20.0, 10.0, 0.0))?;
/// assert_eq!(report.middle_index, ChunkIndex::new(1, 0));
/// # Ok::<(), voxel_streamer::StreamingError>(())
/// ```
pub struct WorldStreamer {
    config: StreamingConfig,
    grid: ChunkGrid,
    pipeline: PreloadPipeline,
    store: Option<Arc<dyn ChunkStore>>,
    stats: StreamingStats,
}

impl WorldStreamer {
    /// Loads the window centred on `start` and starts preloading around it.
    ///
    /// The initial window is loaded synchronously through `loader`. `store`, if given,
    /// receives chunks carrying edits when they are destroyed; it is normally the
    /// same store the loader consults.
    pub fn new(
        config: StreamingConfig,
        loader: Arc<dyn ChunkLoader>,
        store: Option<Arc<dyn ChunkStore>>,
        start: ChunkIndex,
    ) -> StreamingResult<Self> {
        config.validate()?;
        let started = Instant::now();

        let mut pipeline = PreloadPipeline::new(&config, loader.clone())?;
        let grid = Self::load_window(&config, loader.as_ref(), start)?;
        let mut stats = StreamingStats::default();
        for direction in Direction::ALL {
            pipeline.replenish(direction, &grid, &mut stats);
        }

        log::info!(
            "Loaded {} chunks around {} in {} ms",
            grid.len(),
            start,
            started.elapsed().as_millis()
        );

        Ok(WorldStreamer {
            config,
            grid,
            pipeline,
            store,
            stats,
        })
    }

    /// Streams terrain from `config.generator`, keeping edited chunks in a
    /// `MemoryChunkStore`.
    pub fn from_config(config: StreamingConfig, start: ChunkIndex) -> StreamingResult<Self> {
        let store: Arc<dyn ChunkStore> = Arc::new(MemoryChunkStore::default());
        let loader = Arc::new(StoreBackedLoader::new(
            config.generator.clone(),
            Some(store.clone()),
        ));
        Self::new(config, loader, Some(store), start)
    }

    fn load_window(
        config: &StreamingConfig,
        loader: &dyn ChunkLoader,
        start: ChunkIndex,
    ) -> StreamingResult<ChunkGrid> {
        let half = (config.world_size / 2) as i32;
        let mut columns = Vec::with_capacity(config.world_size);
        for i in 0..config.world_size as i32 {
            let origin = ChunkIndex::new(start.x - half + i, start.z - half);
            let chunks = (0..config.world_size as i32)
                .map(|j| Self::load_now(config, loader, origin.step(ascending(Axis::Z), j)))
                .collect::<StreamingResult<Vec<_>>>()?;
            columns.push(Slice::new(chunks));
        }
        Ok(ChunkGrid::from_columns(start, config.world_size, columns))
    }

    /// Loads one chunk on the calling thread, retrying with backoff until the stall
    /// timeout runs out.
    fn load_now(
        config: &StreamingConfig,
        loader: &dyn ChunkLoader,
        index: ChunkIndex,
    ) -> StreamingResult<Chunk> {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            match load_checked(loader, index, config.chunk_dimensions) {
                Ok(chunk) => return Ok(chunk),
                Err(e) => {
                    attempt += 1;
                    if started.elapsed() >= config.stall_timeout() {
                        return Err(e);
                    }
                    log::warn!("Initial load of chunk {} failed: {}; retrying", index, e);
                    std::thread::sleep(config.retry.backoff(attempt));
                }
            }
        }
    }

    /// Advances streaming for the observer at `observer` (world units).
    ///
    /// Shifts at most once per axis. If a needed slice is still in production the tick
    /// blocks until it arrives; after the configured stall timeout it returns
    /// `PreloadStalled` and the grid is left as it was before the failed shift.
    pub fn tick(&mut self, observer: Point3<f32>) -> StreamingResult<TickReport> {
        self.pipeline.pump(&mut self.stats);

        let target = self.observer_chunk(observer);
        let stalls_before = self.stats.stalls;
        let mut shifts = 0;

        for axis in [Axis::X, Axis::Z] {
            let middle = self.grid.middle_index();
            if let Some(direction) = Direction::towards(axis, middle.along(axis), target.along(axis)) {
                self.stream(direction)?;
                shifts += 1;
            }
        }

        if shifts == 0 {
            self.realign();
        }

        Ok(TickReport {
            shifts,
            stalls: self.stats.stalls - stalls_before,
            middle_index: self.grid.middle_index(),
        })
    }

    /// Shifts the window one chunk towards `direction`.
    fn stream(&mut self, direction: Direction) -> StreamingResult<()> {
        let stale = self
            .pipeline
            .supersede_misaligned(direction, &self.grid, &mut self.stats);
        self.retire_all(stale);
        self.pipeline.replenish(direction, &self.grid, &mut self.stats);

        let taken = self.pipeline.take_blocking(direction, &mut self.stats)?;
        let trailing = self.grid.shift(direction, taken.slice);
        self.stats.shifts += 1;
        log::debug!(
            "Shifted {:?}, middle index now {}",
            direction,
            self.grid.middle_index()
        );

        let leftover = self.pipeline.follow_shift(
            direction,
            taken.spare,
            trailing,
            &self.grid,
            &mut self.stats,
        );
        self.retire_all(leftover);
        self.pipeline.start_refills(&mut self.stats);
        self.pipeline.replenish(direction, &self.grid, &mut self.stats);
        Ok(())
    }

    /// Supersedes misaligned queue entries in every direction and refills the queues.
    fn realign(&mut self) {
        for direction in Direction::ALL {
            let stale = self
                .pipeline
                .supersede_misaligned(direction, &self.grid, &mut self.stats);
            self.retire_all(stale);
            self.pipeline.replenish(direction, &self.grid, &mut self.stats);
        }
    }

    fn retire_all(&mut self, chunks: Vec<Chunk>) {
        for chunk in chunks {
            self.retire(chunk);
        }
    }

    /// Destroys a chunk that has left the window for good, persisting it first if it
    /// carries edits.
    fn retire(&mut self, chunk: Chunk) {
        let Some(store) = &self.store else {
            return;
        };
        if !chunk.is_dirty() {
            return;
        }
        match store.save(&chunk) {
            Ok(()) => self.stats.chunks_persisted += 1,
            Err(e) => {
                log::error!("Edits to chunk {} are lost: {}", chunk.index(), e);
                self.stats.persist_failures += 1;
            }
        }
    }

    /// Chunk index of the observer at `position` (world units).
    pub fn observer_chunk(&self, position: Point3<f32>) -> ChunkIndex {
        let voxel = position / self.config.voxel_size;
        ChunkIndex::from_voxel(
            Point3::new(
                voxel.x.floor() as i32,
                voxel.y.floor() as i32,
                voxel.z.floor() as i32,
            ),
            self.config.chunk_dimensions,
        )
    }

    /// Places `cell` at a world voxel position, or clears it when `cell` is `None`.
    /// Returns the previous occupant.
    ///
    /// Rejected with `ChunkNotLoaded` if the position is outside the window and with
    /// `OutsideVerticalRange` if it is above or below the chunk column.
    pub fn mutate_cube(
        &mut self,
        voxel: Point3<i32>,
        cell: Option<VoxelCell>,
    ) -> StreamingResult<Option<VoxelCell>> {
        let index = ChunkIndex::from_voxel(voxel, self.grid.dims());
        if !self.grid.contains(index) {
            return Err(StreamingError::ChunkNotLoaded { index });
        }
        let (index, local) = self
            .grid
            .locate(voxel)
            .ok_or(StreamingError::OutsideVerticalRange { y: voxel.y })?;
        let chunk = self
            .grid
            .chunk_at_mut(index)
            .ok_or(StreamingError::ChunkNotLoaded { index })?;

        Ok(match cell {
            Some(cell) => chunk.set(local.x, local.y, local.z, cell),
            None => chunk.remove(local.x, local.y, local.z),
        })
    }

    /// The contents of a world voxel position. Positions above or below the chunk
    /// column of a loaded chunk are `Empty`.
    pub fn query_cube(&self, voxel: Point3<i32>) -> CubeQuery {
        let index = ChunkIndex::from_voxel(voxel, self.grid.dims());
        if !self.grid.contains(index) {
            return CubeQuery::NotLoaded;
        }
        match self.grid.cell_at(voxel) {
            Some(Some(cell)) => CubeQuery::Occupied(cell),
            _ => CubeQuery::Empty,
        }
    }

    /// Render-candidate faces of the block at a world voxel position, with neighbours
    /// in adjacent loaded chunks taken into account. `None` if the position is not
    /// loaded.
    pub fn visible_face_mask(&self, voxel: Point3<i32>) -> Option<FaceMask> {
        self.grid.visible_face_mask(voxel)
    }

    /// Every chunk currently in the window.
    pub fn loaded_chunks(&self) -> impl Iterator<Item = (ChunkIndex, &Chunk)> {
        self.grid.chunks().map(|chunk| (chunk.index(), chunk))
    }

    pub fn chunk_at(&self, index: ChunkIndex) -> Option<&Chunk> {
        self.grid.chunk_at(index)
    }

    /// Saves every edited chunk in the window to the store and marks it clean.
    /// Returns the number of chunks written.
    pub fn persist_loaded(&mut self) -> StreamingResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let mut written = 0;
        for chunk in self.grid.chunks_mut().filter(|chunk| chunk.is_dirty()) {
            store.save(chunk)?;
            chunk.mark_clean();
            written += 1;
        }
        self.stats.chunks_persisted += written as u64;
        log::info!("Persisted {} loaded chunks", written);
        Ok(written)
    }

    pub fn middle_index(&self) -> ChunkIndex {
        self.grid.middle_index()
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn stats(&self) -> &StreamingStats {
        &self.stats
    }

    /// First chunk of each entry queued for `direction`, nearest first. East and West
    /// entries start `preload_size` chunks beyond the window's northern edge.
    pub fn preload_queue(&self, direction: Direction) -> Vec<ChunkIndex> {
        self.pipeline.queue(direction).origins()
    }

    /// Every loaded chunk waiting in a preload queue.
    pub fn preloaded_chunks(&self) -> Vec<ChunkIndex> {
        self.pipeline.preloaded_indices()
    }

    /// How many entries queued for `direction` are completely loaded.
    pub fn ready_preloads(&self, direction: Direction) -> usize {
        self.pipeline.queue(direction).ready_count()
    }

    /// Producer tasks still running or waiting for a worker.
    pub fn outstanding_requests(&self) -> usize {
        self.pipeline.outstanding_requests()
    }
}
