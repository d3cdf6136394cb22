//! # Preload Pipeline
//!
//! Per-direction queues of slices produced ahead of need, so a grid shift can
//! complete by dequeuing a ready slice instead of generating one.
//!
//! ## Locking discipline
//!
//! Each direction owns one `SliceQueue`: a mutex over its entries plus a condition
//! variable signalled whenever a chunk lands in an entry. That single lock covers the
//! operations producers and the consumer share:
//!
//! - enqueueing a request (tick thread),
//! - depositing a loaded chunk (worker thread),
//! - taking the front entry (tick thread),
//! - moving entries along with the window (tick thread).
//!
//! Workers never touch the chunk grid. A loaded chunk stays inside its queue entry
//! until the tick thread takes the entry and hands it to the grid.
//!
//! ## Entries
//!
//! An entry is a run of chunk slots along the slice's own axis. Slices for East and
//! West reach `preload_size` chunks past the window on both sides, so together they
//! also hold the four corner blocks diagonal to the window. North and South slices
//! are exactly as wide as the window.
//!
//! When the window shifts along one axis, the entries of the two queues on the other
//! axis move along with it: each drops the chunk at its trailing end and gains a slot
//! at its leading end. East and West slices taken by a shift bring exactly the chunks
//! North and South entries gain, and North and South entries drop exactly the chunks
//! a recycled East or West slice needs at its ends. Only East and West entries moving
//! north or south gain slots that nobody holds; a producer loads those.
//!
//! ## Ordering
//!
//! Entries are ordered by distance from the window edge, and only the front entry
//! can be taken. A later request that finishes first simply waits behind the
//! earlier one.
//!
//! ## Supersession
//!
//! Queued entries that stop matching the window, or that are pushed beyond the
//! preload depth, are removed. A producer still filling such an entry finds it gone
//! and discards what it loads.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use web_time::Instant;

use super::stats::StreamingStats;
use crate::config::{RetryPolicy, StreamingConfig};
use crate::engine_state::task_management::TaskManager;
use crate::engine_state::voxels::chunk::{Chunk, ChunkDimensions};
use crate::engine_state::voxels::chunk_index::{Axis, ChunkIndex, Direction};
use crate::engine_state::voxels::grid::{ascending, ChunkGrid, Slice};
use crate::engine_state::voxels::loader::ChunkLoader;
use crate::engine_state::voxels::tasks::slice_preload_task::SlicePreloadTask;
use crate::error::{StreamingError, StreamingResult};

/// Result of a non-blocking take.
#[derive(Debug)]
pub enum SliceTake {
    /// The front entry was ready and has been removed from the queue.
    Ready(TakenSlice),
    /// The front entry is still being produced.
    Pending,
    /// Nothing is queued.
    Empty,
}

/// A slice removed from the front of a queue.
#[derive(Debug)]
pub struct TakenSlice {
    /// The chunks that border the window.
    pub slice: Slice,
    /// Loaded chunks of the entry beyond the window's span.
    pub spare: Vec<Chunk>,
}

struct SliceEntry {
    ticket: u64,
    origin: ChunkIndex,
    slots: VecDeque<Option<Chunk>>,
    /// Whether a producer currently owns loading this entry's empty slots.
    filling: bool,
}

impl SliceEntry {
    fn slot_of(&self, span: Direction, index: ChunkIndex) -> Option<usize> {
        let axis = span.axis();
        if index.along(axis.orthogonal()) != self.origin.along(axis.orthogonal()) {
            return None;
        }
        usize::try_from(index.along(axis) - self.origin.along(axis))
            .ok()
            .filter(|&slot| slot < self.slots.len())
    }

    fn is_filled(&self, margin: usize, core: usize) -> bool {
        self.slots.iter().skip(margin).take(core).all(Option::is_some)
    }

    fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

/// Entries dropped from a queue because they no longer matched the window.
#[derive(Debug, Default)]
pub struct Superseded {
    /// Number of entries removed.
    pub entries: usize,
    /// Entries removed while a producer was still filling them.
    pub in_production: usize,
    /// Loaded chunks of the removed entries; they are the caller's to retire.
    pub chunks: Vec<Chunk>,
}

/// What moving a queue's entries along with the window changed.
#[derive(Debug, Default)]
pub struct Slid {
    /// Number of entries moved.
    pub entries: usize,
    /// Chunks that fell off the trailing end of an entry.
    pub dropped: Vec<Chunk>,
    /// Entries that gained an empty slot and have no producer.
    pub unfilled: Vec<u64>,
}

/// The queue of outstanding and ready slices for one direction.
pub struct SliceQueue {
    direction: Direction,
    margin: usize,
    core: usize,
    entries: Mutex<VecDeque<SliceEntry>>,
    ready: Condvar,
}

impl SliceQueue {
    /// A queue whose entries hold `core` chunks bordering the window plus `margin`
    /// chunks beyond it on each side.
    pub fn new(direction: Direction, margin: usize, core: usize) -> Self {
        SliceQueue {
            direction,
            margin,
            core,
            entries: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn margin(&self) -> usize {
        self.margin
    }

    /// Chunks per entry.
    pub fn slice_len(&self) -> usize {
        self.core + 2 * self.margin
    }

    /// The direction in which an entry's slots run.
    pub fn span(&self) -> Direction {
        ascending(self.direction.axis().orthogonal())
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<SliceEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a request whose chunks a producer will load later.
    pub fn push_pending(&self, ticket: u64, origin: ChunkIndex) {
        self.lock().push_back(SliceEntry {
            ticket,
            origin,
            slots: (0..self.slice_len()).map(|_| None).collect(),
            filling: true,
        });
    }

    /// Puts a slice assembled by the tick thread at the front of the queue. Returns
    /// `true` if some of its slots are empty and a producer must be started for it.
    pub fn push_front(
        &self,
        ticket: u64,
        origin: ChunkIndex,
        slots: VecDeque<Option<Chunk>>,
    ) -> bool {
        debug_assert_eq!(slots.len(), self.slice_len());
        let entry = SliceEntry {
            ticket,
            origin,
            filling: !slots.iter().all(Option::is_some),
            slots,
        };
        let unfilled = entry.filling;
        self.lock().push_front(entry);
        self.ready.notify_all();
        unfilled
    }

    /// The next chunk the producer of `ticket` should load. Returns `None`, and
    /// releases the entry's producer, once nothing is left to load or the entry is
    /// gone.
    pub fn next_missing(&self, ticket: u64) -> Option<ChunkIndex> {
        let span = self.span();
        let mut entries = self.lock();
        let entry = entries.iter_mut().find(|entry| entry.ticket == ticket)?;
        match entry.slots.iter().position(Option::is_none) {
            Some(slot) => Some(entry.origin.step(span, slot as i32)),
            None => {
                entry.filling = false;
                None
            }
        }
    }

    /// Whether `ticket` still has an empty slot for `index`.
    pub fn is_needed(&self, ticket: u64, index: ChunkIndex) -> bool {
        let span = self.span();
        self.lock().iter().any(|entry| {
            entry.ticket == ticket
                && matches!(entry.slot_of(span, index), Some(slot) if entry.slots[slot].is_none())
        })
    }

    /// Places a loaded chunk in its slot of `ticket`. Returns `false`, dropping the
    /// chunk, if the entry is gone or no longer has an empty slot for it.
    pub fn deposit(&self, ticket: u64, chunk: Chunk) -> bool {
        let span = self.span();
        let mut entries = self.lock();
        let Some(entry) = entries.iter_mut().find(|entry| entry.ticket == ticket) else {
            return false;
        };
        match entry.slot_of(span, chunk.index()) {
            Some(slot) if entry.slots[slot].is_none() => {
                entry.slots[slot] = Some(chunk);
                drop(entries);
                self.ready.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Removes and returns the front entry if the chunks bordering the window are
    /// loaded. Empty margin slots do not hold it back.
    pub fn try_take(&self) -> SliceTake {
        let mut entries = self.lock();
        let front_filled = entries
            .front()
            .map(|entry| entry.is_filled(self.margin, self.core));
        match front_filled {
            None => SliceTake::Empty,
            Some(false) => SliceTake::Pending,
            Some(true) => match entries.pop_front() {
                Some(entry) => {
                    let mut chunks = Vec::with_capacity(self.core);
                    let mut spare = Vec::new();
                    for (slot, chunk) in entry.slots.into_iter().enumerate() {
                        let Some(chunk) = chunk else { continue };
                        if (self.margin..self.margin + self.core).contains(&slot) {
                            chunks.push(chunk);
                        } else {
                            spare.push(chunk);
                        }
                    }
                    SliceTake::Ready(TakenSlice {
                        slice: Slice::new(chunks),
                        spare,
                    })
                }
                None => SliceTake::Empty,
            },
        }
    }

    /// Blocks while the front entry cannot be taken, for at most `timeout`. Does not
    /// take anything.
    pub fn wait_for_front(&self, timeout: Duration) {
        let entries = self.lock();
        let front_unfilled = |entries: &mut VecDeque<SliceEntry>| {
            entries
                .front()
                .is_some_and(|entry| !entry.is_filled(self.margin, self.core))
        };
        let (_entries, _timed_out) = self
            .ready
            .wait_timeout_while(entries, timeout, front_unfilled)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Removes every entry from the first one whose origin differs from
    /// `expected(distance)` onwards, keeping at most `depth` entries.
    pub fn retain_aligned(
        &self,
        depth: usize,
        expected: impl Fn(i32) -> ChunkIndex,
    ) -> Superseded {
        let mut entries = self.lock();
        let keep = entries
            .iter()
            .enumerate()
            .take_while(|(i, entry)| *i < depth && entry.origin == expected(*i as i32 + 1))
            .count();

        let mut superseded = Superseded::default();
        for entry in entries.drain(keep..) {
            superseded.entries += 1;
            if entry.filling {
                superseded.in_production += 1;
            }
            superseded.chunks.extend(entry.slots.into_iter().flatten());
        }
        superseded
    }

    /// Moves every entry one chunk towards `step`, which must run along the entries'
    /// own axis. The slot gained at the leading end is taken from `supply` when it
    /// has the chunk and left empty otherwise.
    pub fn slide(
        &self,
        step: Direction,
        mut supply: impl FnMut(ChunkIndex) -> Option<Chunk>,
    ) -> Slid {
        debug_assert_eq!(step.axis(), self.span().axis());
        let span = self.span();
        let mut slid = Slid::default();
        let mut entries = self.lock();
        for entry in entries.iter_mut() {
            let len = entry.slots.len();
            if len == 0 {
                continue;
            }
            let (trailing, leading) = if step.sign() > 0 {
                (entry.slots.pop_front(), entry.origin.step(span, len as i32))
            } else {
                (entry.slots.pop_back(), entry.origin.step(span, -1))
            };
            slid.dropped.extend(trailing.flatten());

            let gained = supply(leading);
            if step.sign() > 0 {
                entry.slots.push_back(gained);
            } else {
                entry.slots.push_front(gained);
            }
            entry.origin = entry.origin.step(step, 1);
            slid.entries += 1;

            if !entry.filling && !entry.is_complete() {
                entry.filling = true;
                slid.unfilled.push(entry.ticket);
            }
        }
        drop(entries);
        self.ready.notify_all();
        slid
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Origins of the queued entries, front first.
    pub fn origins(&self) -> Vec<ChunkIndex> {
        self.lock().iter().map(|entry| entry.origin).collect()
    }

    /// Number of entries with every slot loaded.
    pub fn ready_count(&self) -> usize {
        self.lock().iter().filter(|entry| entry.is_complete()).count()
    }

    /// Indices of every loaded chunk held by the queue.
    pub fn held_indices(&self) -> Vec<ChunkIndex> {
        self.lock()
            .iter()
            .flat_map(|entry| entry.slots.iter().flatten().map(Chunk::index))
            .collect()
    }
}

/// Background production of slices for the four directions.
pub struct PreloadPipeline {
    queues: [Arc<SliceQueue>; 4],
    loader: Arc<dyn ChunkLoader>,
    task_manager: TaskManager,
    dims: ChunkDimensions,
    preload_size: usize,
    retry: RetryPolicy,
    stall_timeout: Duration,
    poll_interval: Duration,
    next_ticket: u64,
    /// Entries that gained empty slots during the last shift and still need a producer.
    unfilled: Vec<(Direction, u64)>,
    shutdown: Arc<AtomicBool>,
}

impl PreloadPipeline {
    pub fn new(config: &StreamingConfig, loader: Arc<dyn ChunkLoader>) -> StreamingResult<Self> {
        let task_manager = TaskManager::new(config.worker_count, config.max_tasks_in_flight)?;
        let queues = Direction::ALL.map(|direction| {
            let margin = match direction.axis() {
                Axis::X => config.preload_size,
                Axis::Z => 0,
            };
            Arc::new(SliceQueue::new(direction, margin, config.world_size))
        });
        Ok(PreloadPipeline {
            queues,
            loader,
            task_manager,
            dims: config.chunk_dimensions,
            preload_size: config.preload_size,
            retry: config.retry.clone(),
            stall_timeout: config.stall_timeout(),
            poll_interval: config.poll_interval(),
            next_ticket: 0,
            unfilled: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn preload_size(&self) -> usize {
        self.preload_size
    }

    pub fn queue(&self, direction: Direction) -> &SliceQueue {
        &self.queues[direction as usize]
    }

    fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Origin of the entry `distance` slices beyond the `direction` edge of `grid`,
    /// margin included.
    pub fn entry_origin(
        &self,
        direction: Direction,
        grid: &ChunkGrid,
        distance: i32,
    ) -> ChunkIndex {
        let queue = self.queue(direction);
        grid.slice_origin(direction, distance)
            .step(queue.span(), -(queue.margin() as i32))
    }

    /// Schedules background production of the entry starting at `origin` for
    /// `direction`. Never blocks.
    pub fn request_slice(
        &mut self,
        direction: Direction,
        origin: ChunkIndex,
        stats: &mut StreamingStats,
    ) -> u64 {
        let ticket = self.ticket();
        self.queues[direction as usize].push_pending(ticket, origin);
        self.start_producer(direction, ticket);
        stats.slices_requested += 1;
        log::trace!("Requested {:?} slice at {} (ticket {})", direction, origin, ticket);
        ticket
    }

    fn start_producer(&mut self, direction: Direction, ticket: u64) {
        let task = SlicePreloadTask::new(
            self.queues[direction as usize].clone(),
            ticket,
            self.dims,
            self.loader.clone(),
            self.retry.clone(),
            self.shutdown.clone(),
        );
        self.task_manager.publish_task(Box::new(task));
    }

    /// Non-blocking take of the oldest slice for `direction`.
    pub fn try_take_ready(&self, direction: Direction) -> SliceTake {
        self.queue(direction).try_take()
    }

    /// Takes the front slice for `direction`, waiting for its producer if needed.
    ///
    /// Waiting is a backpressure stall: it is counted and logged, and while waiting
    /// the worker pool keeps being serviced. Gives up with `PreloadStalled` after the
    /// configured stall timeout.
    pub fn take_blocking(
        &mut self,
        direction: Direction,
        stats: &mut StreamingStats,
    ) -> StreamingResult<TakenSlice> {
        let queue = self.queues[direction as usize].clone();
        let started = Instant::now();
        let mut stalled = false;

        loop {
            match queue.try_take() {
                SliceTake::Ready(taken) => {
                    if stalled {
                        let waited = started.elapsed();
                        stats.stall_time += waited;
                        log::info!(
                            "{:?} slice arrived after a {} ms stall",
                            direction,
                            waited.as_millis()
                        );
                    }
                    stats.slices_promoted += 1;
                    return Ok(taken);
                }
                SliceTake::Empty => return Err(StreamingError::PipelineShutDown),
                SliceTake::Pending => {
                    if !stalled {
                        stalled = true;
                        stats.stalls += 1;
                        log::warn!(
                            "Backpressure: {:?} slice not ready, waiting for production",
                            direction
                        );
                    }
                    let waited = started.elapsed();
                    if waited >= self.stall_timeout {
                        stats.stall_time += waited;
                        return Err(StreamingError::PreloadStalled { direction, waited });
                    }
                    queue.wait_for_front(self.poll_interval.min(self.stall_timeout - waited));
                    self.pump(stats);
                }
            }
        }
    }

    /// Drops entries for `direction` that no longer line up with `grid`.
    ///
    /// Their loaded chunks are returned for the caller to retire; they must be retired
    /// before `replenish` issues requests that could load the same chunks.
    pub fn supersede_misaligned(
        &mut self,
        direction: Direction,
        grid: &ChunkGrid,
        stats: &mut StreamingStats,
    ) -> Vec<Chunk> {
        let superseded = self.queue(direction).retain_aligned(self.preload_size, |distance| {
            self.entry_origin(direction, grid, distance)
        });
        if superseded.entries > 0 {
            log::debug!(
                "Superseded {} {:?} entries ({} still in production)",
                superseded.entries,
                direction,
                superseded.in_production
            );
        }
        stats.slices_superseded += superseded.entries as u64;
        superseded.chunks
    }

    /// Requests slices until `direction` has `preload_size` entries. Assumes the
    /// queued entries are aligned with `grid` (see `supersede_misaligned`).
    pub fn replenish(
        &mut self,
        direction: Direction,
        grid: &ChunkGrid,
        stats: &mut StreamingStats,
    ) {
        let queued = self.queue(direction).len();
        for distance in queued + 1..=self.preload_size {
            let origin = self.entry_origin(direction, grid, distance as i32);
            self.request_slice(direction, origin, stats);
        }
    }

    /// Brings the queues in line with a `grid` that has just shifted towards `shifted`.
    ///
    /// Entries of the two queues on the other axis move along with the window. The
    /// slots they gain are filled from `spare`, the margin chunks of the slice the
    /// shift consumed. `trailing`, the slice the shift detached, goes to the front of
    /// the opposite queue, with its margins filled from the chunks the moving entries
    /// dropped. Chunks with no place left in any queue are returned for the caller to
    /// retire before calling `start_refills`.
    pub fn follow_shift(
        &mut self,
        shifted: Direction,
        spare: Vec<Chunk>,
        trailing: Slice,
        grid: &ChunkGrid,
        stats: &mut StreamingStats,
    ) -> Vec<Chunk> {
        let mut spare: HashMap<ChunkIndex, Chunk> =
            spare.into_iter().map(|chunk| (chunk.index(), chunk)).collect();
        let mut dropped = HashMap::new();

        for direction in Direction::ALL {
            if direction.axis() == shifted.axis() {
                continue;
            }
            let slid = self.queues[direction as usize].slide(shifted, |index| spare.remove(&index));
            stats.slices_adapted += slid.entries as u64;
            dropped.extend(slid.dropped.into_iter().map(|chunk| (chunk.index(), chunk)));
            self.unfilled
                .extend(slid.unfilled.into_iter().map(|ticket| (direction, ticket)));
        }

        let opposite = shifted.opposite();
        let queue = self.queues[opposite as usize].clone();
        let origin = self.entry_origin(opposite, grid, 1);
        let span = queue.span();
        let margin = queue.margin();
        let core = queue.slice_len() - 2 * margin;
        let mut trailing = trailing.into_chunks().into_iter();
        let slots: VecDeque<Option<Chunk>> = (0..queue.slice_len())
            .map(|slot| {
                if (margin..margin + core).contains(&slot) {
                    trailing.next()
                } else {
                    dropped.remove(&origin.step(span, slot as i32))
                }
            })
            .collect();

        let ticket = self.ticket();
        if queue.push_front(ticket, origin, slots) {
            self.unfilled.push((opposite, ticket));
        }
        stats.slices_recycled += 1;

        let mut leftover = self.supersede_misaligned(opposite, grid, stats);
        leftover.extend(trailing);
        leftover.extend(spare.into_values());
        leftover.extend(dropped.into_values());
        leftover
    }

    /// Starts producers for entries that gained empty slots in `follow_shift`.
    pub fn start_refills(&mut self, stats: &mut StreamingStats) {
        for (direction, ticket) in std::mem::take(&mut self.unfilled) {
            log::trace!("Refilling {:?} entry (ticket {})", direction, ticket);
            self.start_producer(direction, ticket);
            stats.slot_refills += 1;
        }
    }

    /// Collects finished producer results and dispatches queued requests.
    pub fn pump(&mut self, stats: &mut StreamingStats) {
        self.task_manager.process_completed_tasks(stats);
        self.task_manager.process_queued_tasks();
    }

    /// Producer tasks running or waiting for a worker.
    pub fn outstanding_requests(&self) -> usize {
        self.task_manager.num_tasks_in_flight() + self.task_manager.num_queued_tasks()
    }

    /// Indices of every loaded chunk waiting in a queue.
    pub fn preloaded_indices(&self) -> Vec<ChunkIndex> {
        self.queues
            .iter()
            .flat_map(|queue| queue.held_indices())
            .collect()
    }
}

impl Drop for PreloadPipeline {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(x: i32, z: i32) -> Chunk {
        Chunk::empty(ChunkIndex::new(x, z), ChunkDimensions::new(1, 1, 1))
    }

    fn take_origin(queue: &SliceQueue) -> Option<ChunkIndex> {
        match queue.try_take() {
            SliceTake::Ready(taken) => taken.slice.origin(),
            _ => None,
        }
    }

    fn filled(chunks: Vec<Chunk>) -> VecDeque<Option<Chunk>> {
        chunks.into_iter().map(Some).collect()
    }

    #[test]
    fn test_out_of_order_completion_is_delivered_in_request_order() {
        let queue = SliceQueue::new(Direction::North, 0, 1);
        queue.push_pending(1, ChunkIndex::new(0, -2));
        queue.push_pending(2, ChunkIndex::new(0, -3));
        queue.push_pending(3, ChunkIndex::new(0, -4));

        assert!(queue.deposit(3, chunk(0, -4)));
        assert!(queue.deposit(2, chunk(0, -3)));
        assert!(matches!(queue.try_take(), SliceTake::Pending));
        assert_eq!(queue.ready_count(), 2);

        assert!(queue.deposit(1, chunk(0, -2)));
        assert_eq!(take_origin(&queue), Some(ChunkIndex::new(0, -2)));
        assert_eq!(take_origin(&queue), Some(ChunkIndex::new(0, -3)));
        assert_eq!(take_origin(&queue), Some(ChunkIndex::new(0, -4)));
        assert!(matches!(queue.try_take(), SliceTake::Empty));
    }

    #[test]
    fn test_superseded_deposit_is_discarded() {
        let queue = SliceQueue::new(Direction::West, 0, 1);
        queue.push_pending(1, ChunkIndex::new(-2, 0));
        queue.push_pending(2, ChunkIndex::new(-9, 0));

        let superseded = queue.retain_aligned(4, |distance| ChunkIndex::new(-1 - distance, 0));
        assert_eq!(superseded.entries, 1);
        assert_eq!(superseded.in_production, 1);
        assert!(superseded.chunks.is_empty());
        assert!(!queue.is_needed(2, ChunkIndex::new(-9, 0)));
        assert_eq!(queue.next_missing(2), None);

        assert!(!queue.deposit(2, chunk(-9, 0)));
        assert!(!queue.deposit(1, chunk(-5, 0)));
        assert!(queue.deposit(1, chunk(-2, 0)));
        assert!(!queue.deposit(1, chunk(-2, 0)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_retain_aligned_caps_depth() {
        let queue = SliceQueue::new(Direction::South, 0, 1);
        for d in 1..=3 {
            queue.push_pending(d as u64, ChunkIndex::new(0, d));
        }
        assert!(!queue.push_front(9, ChunkIndex::new(0, 0), filled(vec![chunk(0, 0)])));

        let superseded = queue.retain_aligned(3, |distance| ChunkIndex::new(0, distance - 1));
        assert_eq!(superseded.entries, 1);
        assert_eq!(
            queue.origins(),
            vec![
                ChunkIndex::new(0, 0),
                ChunkIndex::new(0, 1),
                ChunkIndex::new(0, 2)
            ]
        );
    }

    #[test]
    fn test_take_ignores_empty_margins() {
        let queue = SliceQueue::new(Direction::East, 1, 1);
        queue.push_pending(1, ChunkIndex::new(2, -1));
        assert_eq!(queue.next_missing(1), Some(ChunkIndex::new(2, -1)));
        assert!(queue.deposit(1, chunk(2, 0)));
        assert_eq!(queue.ready_count(), 0);

        match queue.try_take() {
            SliceTake::Ready(taken) => {
                assert_eq!(taken.slice.origin(), Some(ChunkIndex::new(2, 0)));
                assert!(taken.spare.is_empty());
            }
            other => panic!("expected a ready slice, got {:?}", other),
        }

        queue.push_pending(2, ChunkIndex::new(3, -1));
        for z in -1..=1 {
            assert!(queue.deposit(2, chunk(3, z)));
        }
        assert_eq!(queue.next_missing(2), None);
        let SliceTake::Ready(taken) = queue.try_take() else {
            panic!("slice should be ready");
        };
        let spare: Vec<_> = taken.spare.iter().map(Chunk::index).collect();
        assert_eq!(spare, vec![ChunkIndex::new(3, -1), ChunkIndex::new(3, 1)]);
    }

    #[test]
    fn test_slide_moves_entries_with_the_window() {
        let queue = SliceQueue::new(Direction::North, 0, 3);
        let slots = filled(vec![chunk(-1, -2), chunk(0, -2), chunk(1, -2)]);
        assert!(!queue.push_front(1, ChunkIndex::new(-1, -2), slots));

        let slid = queue.slide(Direction::East, |index| {
            Some(Chunk::empty(index, ChunkDimensions::new(1, 1, 1)))
        });
        assert_eq!(slid.entries, 1);
        let dropped: Vec<_> = slid.dropped.iter().map(Chunk::index).collect();
        assert_eq!(dropped, vec![ChunkIndex::new(-1, -2)]);
        assert!(slid.unfilled.is_empty());
        assert_eq!(queue.origins(), vec![ChunkIndex::new(0, -2)]);
        assert_eq!(queue.ready_count(), 1);

        // Nothing supplies the new slot, so the entry needs a producer again.
        let slid = queue.slide(Direction::East, |_| None);
        assert_eq!(slid.unfilled, vec![1]);
        assert_eq!(queue.next_missing(1), Some(ChunkIndex::new(3, -2)));
        assert!(matches!(queue.try_take(), SliceTake::Pending));

        // Moving back drops the empty slot again; the producer is still on it.
        let slid = queue.slide(Direction::West, |_| None);
        assert!(slid.dropped.is_empty());
        assert!(slid.unfilled.is_empty());
        assert_eq!(queue.origins(), vec![ChunkIndex::new(0, -2)]);
        assert_eq!(queue.next_missing(1), Some(ChunkIndex::new(0, -2)));
    }

    #[test]
    fn test_wait_for_front_wakes_on_deposit() {
        let queue = Arc::new(SliceQueue::new(Direction::North, 0, 1));
        queue.push_pending(1, ChunkIndex::new(0, -2));

        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                queue.deposit(1, chunk(0, -2))
            })
        };

        let started = std::time::Instant::now();
        queue.wait_for_front(Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(producer.join().unwrap());
        assert_eq!(take_origin(&queue), Some(ChunkIndex::new(0, -2)));
    }
}
