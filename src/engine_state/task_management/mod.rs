//! # Task Management System
//!
//! A pool of worker threads that runs preload work off the tick thread.
//!
//! ## Architecture Overview
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work executed on a worker
//! - `TaskResult`: The result of a completed task, which can spawn additional tasks
//! - `TaskChannel`: Communication channel between the tick thread and one worker
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `TaskManager::publish_task()`
//! 2. The manager hands each task to a worker with spare capacity, round-robin
//! 3. When every worker is at its in-flight cap, the task waits in a local FIFO queue
//! 4. Results are collected on the tick thread in `process_completed_tasks()`
//! 5. `process_queued_tasks()` drains the local queue as capacity frees up
//!
//! Workers are detached: dropping the manager closes their channels and they exit
//! once their current task finishes.

pub mod task;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::info;
use task::{PanickedTask, Task, TaskResult};

use crate::engine_state::streaming::stats::StreamingStats;
use crate::error::StreamingResult;

/// A communication channel between the tick thread and a worker thread.
#[derive(Debug)]
pub struct TaskChannel {
    task_sender: Sender<Box<dyn Task>>,
    result_receiver: Receiver<Box<dyn TaskResult>>,
    num_tasks_in_flight: usize,
    _worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution.
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Task>>,
    current_channel: usize,
    max_tasks_in_flight: usize,
}

impl TaskManager {
    /// Starts `num_workers` worker threads, each accepting up to `max_tasks_in_flight`
    /// tasks before further tasks queue on the manager.
    pub fn new(num_workers: usize, max_tasks_in_flight: usize) -> StreamingResult<Self> {
        let mut channels = Vec::with_capacity(num_workers);

        info!(
            "Starting {} preload workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );

        for worker_idx in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task>>();
            let (result_tx, result_rx) = channel::<Box<dyn TaskResult>>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let description = task.describe();
                    let result: Box<dyn TaskResult> =
                        match panic::catch_unwind(AssertUnwindSafe(|| task.process())) {
                            Ok(result) => result,
                            Err(_) => Box::new(PanickedTask { description }),
                        };
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            };

            let worker = thread::Builder::new()
                .name(format!("preload-worker-{}", worker_idx))
                .spawn(task_closure)?;

            channels.push(TaskChannel {
                task_sender: task_tx,
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                _worker: worker,
            });
        }

        Ok(TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
            max_tasks_in_flight: max_tasks_in_flight.max(1),
        })
    }

    /// Attempts to send a task to a specific worker channel. Returns the task on
    /// failure (worker disconnected) so it can be requeued.
    fn try_send_task(&mut self, task: Box<dyn Task>, channel_idx: usize) -> Result<(), Box<dyn Task>> {
        match self.channels[channel_idx].task_sender.send(task) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                Ok(())
            }
            Err(task) => Err(task.0),
        }
    }

    /// Finds a worker channel below its in-flight cap, round-robin from the last
    /// used channel.
    fn find_available_channel(&self) -> Option<usize> {
        if self.channels.is_empty() {
            return None;
        }

        let start_channel = self.current_channel % self.channels.len();
        let mut current = start_channel;

        loop {
            if self.channels[current].num_tasks_in_flight < self.max_tasks_in_flight {
                return Some(current);
            }
            current = (current + 1) % self.channels.len();
            if current == start_channel {
                return None;
            }
        }
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately handed to a worker
    /// - `false` if the task was queued because all workers are busy
    pub fn publish_task(&mut self, task: Box<dyn Task>) -> bool {
        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    log::warn!("Preload worker {} disconnected", channel_idx);
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Hands queued tasks to workers, oldest first, until the queue is empty or
    /// every worker is at capacity.
    pub fn process_queued_tasks(&mut self) {
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                return;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                }
                Err(task) => {
                    // Channel is disconnected, put task back and stop processing
                    self.queued_tasks.push_front(task);
                    return;
                }
            }
        }
    }

    /// Collects every finished result, runs its handler and publishes any
    /// follow-up tasks. Must be called on the tick thread.
    pub fn process_completed_tasks(&mut self, stats: &mut StreamingStats) {
        let mut tasks_to_queue = Vec::new();
        for channel in &mut self.channels {
            while let Ok(result) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight -= 1;
                tasks_to_queue.extend(result.handle_result(stats));
            }
        }

        for task in tasks_to_queue {
            self.publish_task(task);
        }
    }

    /// Tasks handed to workers whose results have not been collected yet.
    pub fn num_tasks_in_flight(&self) -> usize {
        self.channels.iter().map(|c| c.num_tasks_in_flight).sum()
    }

    pub fn num_queued_tasks(&self) -> usize {
        self.queued_tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    struct CountingTask {
        counter: Arc<AtomicUsize>,
        follow_up: bool,
    }

    struct CountingResult {
        counter: Arc<AtomicUsize>,
        follow_up: bool,
    }

    impl Task for CountingTask {
        fn process(self: Box<Self>) -> Box<dyn TaskResult> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Box::new(CountingResult {
                counter: self.counter,
                follow_up: self.follow_up,
            })
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    impl TaskResult for CountingResult {
        fn handle_result(self: Box<Self>, _stats: &mut StreamingStats) -> Vec<Box<dyn Task>> {
            if self.follow_up {
                vec![Box::new(CountingTask {
                    counter: self.counter,
                    follow_up: false,
                })]
            } else {
                Vec::new()
            }
        }
    }

    struct PanickingTask;

    impl Task for PanickingTask {
        fn process(self: Box<Self>) -> Box<dyn TaskResult> {
            panic!("boom");
        }

        fn describe(&self) -> String {
            "panicking".to_string()
        }
    }

    fn drain(manager: &mut TaskManager, stats: &mut StreamingStats) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while (manager.num_tasks_in_flight() > 0 || manager.num_queued_tasks() > 0)
            && Instant::now() < deadline
        {
            manager.process_completed_tasks(stats);
            manager.process_queued_tasks();
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_queues_beyond_capacity_and_runs_everything() {
        let mut manager = TaskManager::new(2, 1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut stats = StreamingStats::default();

        let mut scheduled = 0;
        for _ in 0..6 {
            if manager.publish_task(Box::new(CountingTask {
                counter: counter.clone(),
                follow_up: true,
            })) {
                scheduled += 1;
            }
        }
        assert_eq!(scheduled, 2);
        assert_eq!(manager.num_queued_tasks(), 4);

        drain(&mut manager, &mut stats);
        // Every task spawned one follow-up.
        assert_eq!(counter.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn test_worker_survives_panicking_task() {
        let mut manager = TaskManager::new(1, 4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut stats = StreamingStats::default();

        manager.publish_task(Box::new(PanickingTask));
        manager.publish_task(Box::new(CountingTask {
            counter: counter.clone(),
            follow_up: false,
        }));
        drain(&mut manager, &mut stats);

        assert_eq!(stats.worker_panics, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
