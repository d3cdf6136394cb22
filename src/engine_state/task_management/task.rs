//! # Task System Core Traits
//!
//! ## Core Components
//! - `Task`: A unit of work executed on a worker thread
//! - `TaskResult`: The outcome of a task, handled back on the tick thread
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the tick thread
//! 5. The result can record statistics and spawn follow-up tasks

use crate::engine_state::streaming::stats::StreamingStats;

/// A unit of work that can be executed on a worker thread.
///
/// Tasks own everything they need; anything shared with the tick thread must be
/// behind its own synchronization.
pub trait Task: Send {
    /// Performs the work and returns the result to hand back to the tick thread.
    fn process(self: Box<Self>) -> Box<dyn TaskResult>;

    /// Short description used in log messages.
    fn describe(&self) -> String;
}

/// The outcome of a processed `Task`.
pub trait TaskResult: Send {
    /// Runs on the tick thread. Returns follow-up tasks to publish (can be empty).
    fn handle_result(self: Box<Self>, stats: &mut StreamingStats) -> Vec<Box<dyn Task>>;
}

/// Result reported in place of a task that panicked on its worker.
pub(crate) struct PanickedTask {
    pub description: String,
}

impl TaskResult for PanickedTask {
    fn handle_result(self: Box<Self>, stats: &mut StreamingStats) -> Vec<Box<dyn Task>> {
        log::error!("Task panicked on its worker: {}", self.description);
        stats.worker_panics += 1;
        Vec::new()
    }
}
