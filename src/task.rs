//! Single unit of work owned by a [`crate::job::Job`].
//!
//! Grounded on `original_source/irmasim/Task.py`: a task only tracks its
//! own remaining operations and accumulated execution time; everything
//! about *where* it runs and *how fast* is the resource tree's business.

use crate::time::Duration;

/// Fully-qualified path of resource ids from the platform root to the leaf
/// a task is placed on, e.g. `["cluster0", "node3", "proc1", "core2"]`.
pub type ResourcePath = Vec<String>;

#[derive(Debug, Clone)]
pub struct Task {
    /// index of the parent job, used to look the job back up from a leaf
    pub job_id: u64,
    /// index of this task within its job's task list
    pub task_id: usize,
    /// remaining operations; monotonically non-increasing, clipped at 0
    pub ops: f64,
    /// operation budget the task started with, fixed for its lifetime
    pub req_ops: f64,
    /// operations-per-cycle (effective IPC) of the profile this task came from
    pub opc: f64,
    /// memory footprint in MB
    pub memory: f64,
    /// memory volume moved per second of compute, in MB
    pub memory_volume: f64,
    /// accumulated execution time while ops remained > 0
    pub execution_time: Duration,
    /// set once the workload manager schedules this task; cleared on reap
    pub placement: Option<ResourcePath>,
}

impl Task {
    pub fn new(job_id: u64, task_id: usize, ops: f64, opc: f64, memory: f64, memory_volume: f64) -> Self {
        Task {
            job_id,
            task_id,
            ops,
            req_ops: ops,
            opc,
            memory,
            memory_volume,
            execution_time: Duration(0.0),
            placement: None,
        }
    }

    pub fn is_placed(&self) -> bool {
        self.placement.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.ops <= 0.0
    }

    /// Subtracts `delta_ops` from the remaining operations (clipped at
    /// zero) and, if the task was still running, advances its accumulated
    /// execution time by `delta_time`. Mirrors `Task.advance` exactly,
    /// including the floor-before-subtract rounding of the reference.
    pub fn advance(&mut self, delta_time: Duration, delta_ops: f64) {
        let was_running = self.ops > 0.0;
        self.ops -= delta_ops.floor();
        if self.ops < 0.0 {
            self.ops = 0.0;
        }
        if was_running {
            self.execution_time += delta_time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_clips_at_zero_and_stops_accumulating_time() {
        let mut t = Task::new(0, 0, 10.0, 1.0, 0.0, 0.0);
        t.advance(Duration(1.0), 6.0);
        assert_eq!(t.ops, 4.0);
        assert_eq!(t.execution_time, Duration(1.0));

        t.advance(Duration(1.0), 20.0);
        assert_eq!(t.ops, 0.0);
        assert!(t.is_finished());
        assert_eq!(t.execution_time, Duration(2.0));

        // once finished, further advances must not add execution time
        t.advance(Duration(1.0), 0.0);
        assert_eq!(t.execution_time, Duration(2.0));
    }
}
