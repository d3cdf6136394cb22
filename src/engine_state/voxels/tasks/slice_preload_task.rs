//! # Slice Preload Task
//!
//! Loads the empty slots of one entry in a direction's preload queue. The task asks
//! the queue which chunk is missing next, loads it through the `ChunkLoader`, retrying
//! failed or panicking loads with backoff, and deposits it back into the entry. The
//! chunks are handed over through the queue itself, so a stalled shift wakes up as
//! soon as its slice is complete.
//!
//! The task keeps going until the entry has no empty slot left or is gone, so slots
//! an entry gains while the task runs are picked up by the same task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use web_time::Instant;

use crate::config::RetryPolicy;
use crate::engine_state::streaming::pipeline::SliceQueue;
use crate::engine_state::streaming::stats::StreamingStats;
use crate::engine_state::task_management::task::{Task, TaskResult};
use crate::engine_state::voxels::chunk::{Chunk, ChunkDimensions};
use crate::engine_state::voxels::chunk_index::{ChunkIndex, Direction};
use crate::engine_state::voxels::loader::{load_checked, ChunkLoader};

pub struct SlicePreloadTask {
    queue: Arc<SliceQueue>,
    ticket: u64,
    dims: ChunkDimensions,
    loader: Arc<dyn ChunkLoader>,
    retry: RetryPolicy,
    shutdown: Arc<AtomicBool>,
}

impl SlicePreloadTask {
    pub fn new(
        queue: Arc<SliceQueue>,
        ticket: u64,
        dims: ChunkDimensions,
        loader: Arc<dyn ChunkLoader>,
        retry: RetryPolicy,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        SlicePreloadTask {
            queue,
            ticket,
            dims,
            loader,
            retry,
            shutdown,
        }
    }

    fn direction(&self) -> Direction {
        self.queue.direction()
    }

    fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Loads `index`, retrying until it succeeds. Gives up only when the entry no
    /// longer needs the chunk or the pipeline is shutting down.
    fn load_with_retry(&self, index: ChunkIndex, retries: &mut u64) -> Option<Chunk> {
        let mut attempt = 0;
        loop {
            match load_checked(self.loader.as_ref(), index, self.dims) {
                Ok(chunk) => return Some(chunk),
                Err(e) => {
                    attempt += 1;
                    *retries += 1;
                    let backoff = self.retry.backoff(attempt);
                    log::warn!(
                        "Loading chunk {} failed (attempt {}): {}; retrying in {} ms",
                        index,
                        attempt,
                        e,
                        backoff.as_millis()
                    );
                    if self.is_shut_down() || !self.queue.is_needed(self.ticket, index) {
                        return None;
                    }
                    std::thread::sleep(backoff);
                }
            }
        }
    }
}

impl Task for SlicePreloadTask {
    fn process(self: Box<Self>) -> Box<dyn TaskResult> {
        let started = Instant::now();
        let mut result = SlicePreloadResult {
            direction: self.direction(),
            ticket: self.ticket,
            loaded: 0,
            discarded: 0,
            retries: 0,
        };

        while !self.is_shut_down() {
            let Some(index) = self.queue.next_missing(self.ticket) else {
                break;
            };
            // `None` means the slot went away while retrying; move on to the next one.
            if let Some(chunk) = self.load_with_retry(index, &mut result.retries) {
                if self.queue.deposit(self.ticket, chunk) {
                    result.loaded += 1;
                } else {
                    result.discarded += 1;
                }
            }
        }

        log::trace!(
            "Loaded {} chunks for {:?} entry {} in {} us",
            result.loaded,
            result.direction,
            result.ticket,
            started.elapsed().as_micros()
        );
        Box::new(result)
    }

    fn describe(&self) -> String {
        format!("preload {:?} entry {}", self.direction(), self.ticket)
    }
}

pub struct SlicePreloadResult {
    direction: Direction,
    ticket: u64,
    loaded: u64,
    /// Chunks loaded for slots the entry no longer had when they arrived.
    discarded: u64,
    retries: u64,
}

impl TaskResult for SlicePreloadResult {
    fn handle_result(self: Box<Self>, stats: &mut StreamingStats) -> Vec<Box<dyn Task>> {
        stats.chunks_loaded += self.loaded;
        stats.producer_retries += self.retries;
        if self.discarded > 0 {
            log::debug!(
                "Dropped {} chunks loaded for {:?} entry {}: no longer needed",
                self.discarded,
                self.direction,
                self.ticket
            );
            stats.chunks_discarded += self.discarded;
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::engine_state::streaming::pipeline::SliceTake;
    use crate::error::{StreamingError, StreamingResult};

    const DIMS: ChunkDimensions = ChunkDimensions::new(2, 2, 2);

    /// Fails the first `failures` loads, then produces empty chunks.
    struct FlakyLoader {
        failures: AtomicUsize,
    }

    impl ChunkLoader for FlakyLoader {
        fn load_chunk(&self, index: ChunkIndex, dims: ChunkDimensions) -> StreamingResult<Chunk> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StreamingError::Generation {
                    index,
                    reason: "flaky".to_string(),
                });
            }
            Ok(Chunk::empty(index, dims))
        }
    }

    /// Panics on the first load, then produces empty chunks.
    struct PanicOnceLoader {
        panicked: AtomicBool,
    }

    impl ChunkLoader for PanicOnceLoader {
        fn load_chunk(&self, index: ChunkIndex, dims: ChunkDimensions) -> StreamingResult<Chunk> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("terrain source went away");
            }
            Ok(Chunk::empty(index, dims))
        }
    }

    fn retry() -> RetryPolicy {
        RetryPolicy {
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    fn task(queue: Arc<SliceQueue>, loader: Arc<dyn ChunkLoader>) -> Box<SlicePreloadTask> {
        Box::new(SlicePreloadTask::new(
            queue,
            1,
            DIMS,
            loader,
            retry(),
            Arc::new(AtomicBool::new(false)),
        ))
    }

    fn flaky(failures: usize) -> Arc<dyn ChunkLoader> {
        Arc::new(FlakyLoader {
            failures: AtomicUsize::new(failures),
        })
    }

    fn take_indices(queue: &SliceQueue) -> Vec<ChunkIndex> {
        let SliceTake::Ready(taken) = queue.try_take() else {
            panic!("slice should be ready");
        };
        taken.slice.chunks().iter().map(Chunk::index).collect()
    }

    #[test]
    fn test_fills_entry_along_orthogonal_axis() {
        let queue = Arc::new(SliceQueue::new(Direction::North, 0, 3));
        queue.push_pending(1, ChunkIndex::new(-1, -2));

        let mut stats = StreamingStats::default();
        task(queue.clone(), flaky(2)).process().handle_result(&mut stats);
        assert_eq!(stats.producer_retries, 2);
        assert_eq!(stats.chunks_loaded, 3);
        assert_eq!(stats.chunks_discarded, 0);

        assert_eq!(
            take_indices(&queue),
            vec![
                ChunkIndex::new(-1, -2),
                ChunkIndex::new(0, -2),
                ChunkIndex::new(1, -2)
            ]
        );
    }

    #[test]
    fn test_panicking_load_is_retried() {
        let queue = Arc::new(SliceQueue::new(Direction::East, 0, 3));
        queue.push_pending(1, ChunkIndex::new(4, -1));
        let loader = Arc::new(PanicOnceLoader {
            panicked: AtomicBool::new(false),
        });

        let mut stats = StreamingStats::default();
        task(queue.clone(), loader).process().handle_result(&mut stats);
        assert_eq!(stats.producer_retries, 1);
        assert_eq!(stats.chunks_loaded, 3);
        assert_eq!(queue.ready_count(), 1);
        assert_eq!(take_indices(&queue)[0], ChunkIndex::new(4, -1));
    }

    #[test]
    fn test_only_empty_slots_are_loaded() {
        let queue = Arc::new(SliceQueue::new(Direction::North, 0, 3));
        let slots = [
            Some(Chunk::empty(ChunkIndex::new(-1, -2), DIMS)),
            None,
            Some(Chunk::empty(ChunkIndex::new(1, -2), DIMS)),
        ];
        assert!(queue.push_front(1, ChunkIndex::new(-1, -2), slots.into_iter().collect()));

        let mut stats = StreamingStats::default();
        task(queue.clone(), flaky(0)).process().handle_result(&mut stats);
        assert_eq!(stats.chunks_loaded, 1);
        assert_eq!(queue.ready_count(), 1);
    }

    #[test]
    fn test_superseded_entry_stops_retrying() {
        // Nothing queued under ticket 1, so the task has nothing to load.
        let queue = Arc::new(SliceQueue::new(Direction::East, 0, 3));
        let mut stats = StreamingStats::default();
        task(queue.clone(), flaky(usize::MAX)).process().handle_result(&mut stats);
        assert_eq!(stats.producer_retries, 0);
        assert_eq!(stats.chunks_loaded, 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_gives_up_on_slot_that_slid_away() {
        let queue = Arc::new(SliceQueue::new(Direction::North, 0, 1));
        queue.push_pending(1, ChunkIndex::new(0, -2));

        // Fails once, then the entry moves east before the retry.
        struct MovingLoader {
            queue: Arc<SliceQueue>,
        }
        impl ChunkLoader for MovingLoader {
            fn load_chunk(
                &self,
                index: ChunkIndex,
                dims: ChunkDimensions,
            ) -> StreamingResult<Chunk> {
                if index == ChunkIndex::new(0, -2) {
                    self.queue.slide(Direction::East, |_| None);
                    return Err(StreamingError::Generation {
                        index,
                        reason: "moved".to_string(),
                    });
                }
                Ok(Chunk::empty(index, dims))
            }
        }

        let loader = Arc::new(MovingLoader {
            queue: queue.clone(),
        });
        let mut stats = StreamingStats::default();
        task(queue.clone(), loader).process().handle_result(&mut stats);
        assert_eq!(stats.producer_retries, 1);
        assert_eq!(take_indices(&queue), vec![ChunkIndex::new(1, -2)]);
    }
}
