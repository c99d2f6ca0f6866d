//! Scheduling policies, grounded on `workload_manager/*.py`. Spec.md §9
//! "Dynamic workload-manager dispatch": a tagged enum of built-in
//! policies with a trait-object escape hatch for plug-ins, so the
//! simulator calls the trait through the enum rather than matching on
//! policy type at every step.

pub mod backfill;
pub mod basic;
pub mod energy;
pub mod heuristic;

use crate::config::WorkloadManagerConfig;
use crate::error::{Error, Result};
use crate::job_queue::JobQueue;
use crate::platform::Platform;
use crate::time::Time;

/// A placement a policy wants the simulator to apply: task `task_id` of
/// job `job_id`, onto the leaf at `path`.
#[derive(Debug, Clone)]
pub struct Placement {
    pub job_id: u64,
    pub task_id: usize,
    pub path: Vec<String>,
}

/// Policies observe job lifecycle events and, in response, request
/// placements; the simulator applies them and calls `platform.schedule`.
/// No method may block or keep a reference across calls (spec.md §5).
///
/// `now` is passed explicitly (rather than read off the jobs themselves)
/// because a policy's own bookkeeping -- conservative backfill's shadow
/// time chief among them -- needs the current instant even when every
/// job in the callback has a different, earlier `submit_time`.
pub trait WorkloadManager {
    fn on_job_submission(&mut self, now: Time, jobs: &[u64], queue: &JobQueue, platform: &Platform) -> Vec<Placement>;
    fn on_job_completion(&mut self, now: Time, jobs: &[u64], queue: &JobQueue, platform: &Platform) -> Vec<Placement>;
    fn on_end_step(&mut self, _now: Time, _queue: &JobQueue, _platform: &Platform) {}
}

pub enum Policy {
    Basic(basic::Basic),
    Heuristic(heuristic::Heuristic),
    Backfill(backfill::Backfill),
    Energy(energy::Energy),
    Plugin(Box<dyn WorkloadManager>),
}

impl Policy {
    pub fn from_config(config: &WorkloadManagerConfig) -> Result<Self> {
        match config.kind.as_str() {
            "Basic" => Ok(Policy::Basic(basic::Basic::new())),
            "Heuristic" => Ok(Policy::Heuristic(heuristic::Heuristic::new(config))),
            "Backfill" => Ok(Policy::Backfill(backfill::Backfill::new(config))),
            "Energy" => Ok(Policy::Energy(energy::Energy::new(config))),
            other => Err(Error::config(format!("unknown workload_manager.type {:?}", other))),
        }
    }
}

impl WorkloadManager for Policy {
    fn on_job_submission(&mut self, now: Time, jobs: &[u64], queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        match self {
            Policy::Basic(p) => p.on_job_submission(now, jobs, queue, platform),
            Policy::Heuristic(p) => p.on_job_submission(now, jobs, queue, platform),
            Policy::Backfill(p) => p.on_job_submission(now, jobs, queue, platform),
            Policy::Energy(p) => p.on_job_submission(now, jobs, queue, platform),
            Policy::Plugin(p) => p.on_job_submission(now, jobs, queue, platform),
        }
    }

    fn on_job_completion(&mut self, now: Time, jobs: &[u64], queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        match self {
            Policy::Basic(p) => p.on_job_completion(now, jobs, queue, platform),
            Policy::Heuristic(p) => p.on_job_completion(now, jobs, queue, platform),
            Policy::Backfill(p) => p.on_job_completion(now, jobs, queue, platform),
            Policy::Energy(p) => p.on_job_completion(now, jobs, queue, platform),
            Policy::Plugin(p) => p.on_job_completion(now, jobs, queue, platform),
        }
    }

    fn on_end_step(&mut self, now: Time, queue: &JobQueue, platform: &Platform) {
        match self {
            Policy::Basic(p) => p.on_end_step(now, queue, platform),
            Policy::Heuristic(p) => p.on_end_step(now, queue, platform),
            Policy::Backfill(p) => p.on_end_step(now, queue, platform),
            Policy::Energy(p) => p.on_end_step(now, queue, platform),
            Policy::Plugin(p) => p.on_end_step(now, queue, platform),
        }
    }
}

/// Pops tasks of `job_id` from the job queue's submitted partition and
/// assigns them, in task-index order, onto `slots` (one slot per task).
/// Shared by every policy that allocates a whole job at once.
pub(crate) fn pair_tasks_with_slots(job_id: u64, queue: &JobQueue, slots: &[Vec<String>]) -> Vec<Placement> {
    let job = queue.submitted().iter().find(|j| j.id == job_id);
    let Some(job) = job else { return Vec::new() };
    job.tasks
        .iter()
        .zip(slots.iter())
        .map(|(task, path)| Placement {
            job_id,
            task_id: task.task_id,
            path: path.clone(),
        })
        .collect()
}
