//! Aggregate of tasks with submission/start/finish bookkeeping.
//!
//! Grounded on `original_source/irmasim/Job.py` and
//! `Simulator.generate_workload`: a job either inlines its profile fields
//! or references one from the workload file's `profiles` map, and
//! `req_ops` is always stored post-division-by-`ipc`.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::task::Task;
use crate::time::{Duration, Time};

/// The operation/memory profile shared by a job or a family of jobs.
#[derive(Debug, Clone)]
pub struct Profile {
    pub req_ops: f64,
    pub ipc: f64,
    pub req_time: Duration,
    pub mem: f64,
    pub mem_vol: f64,
    pub req_energy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub submit_time: Time,
    pub start_time: Time,
    pub finish_time: Time,
    pub nodes: u32,
    pub ntasks: u32,
    pub ntasks_per_node: u32,
    pub req_time: Duration,
    pub mem: f64,
    pub mem_vol: f64,
    pub req_energy: Option<f64>,
    pub profile_name: Option<String>,
    pub tasks: Vec<Task>,
}

impl Job {
    /// Builds a job from already-resolved resource counts and a profile,
    /// creating one [`Task`] per requested task (every task of an SPMD job
    /// carries an identical share of the profile's operations/memory).
    pub fn new(
        id: u64,
        name: String,
        submit_time: Time,
        nodes: u32,
        ntasks: u32,
        ntasks_per_node: u32,
        profile: &Profile,
        profile_name: Option<String>,
    ) -> Result<Self> {
        if ntasks == 0 {
            return Err(Error::WorkloadValidation {
                job_id: name,
                reason: "ntasks must be positive".into(),
            });
        }
        if nodes * ntasks_per_node < ntasks {
            return Err(Error::WorkloadValidation {
                job_id: name,
                reason: format!(
                    "nodes ({}) * ntasks_per_node ({}) < ntasks ({})",
                    nodes, ntasks_per_node, ntasks
                ),
            });
        }

        let req_ops = (profile.req_ops / profile.ipc).ceil();
        let tasks = (0..ntasks as usize)
            .map(|task_id| Task::new(id, task_id, req_ops, profile.ipc, profile.mem, profile.mem_vol))
            .collect();

        Ok(Job {
            id,
            name,
            submit_time,
            start_time: Time::infinite(),
            finish_time: Time::infinite(),
            nodes,
            ntasks,
            ntasks_per_node,
            req_time: profile.req_time,
            mem: profile.mem,
            mem_vol: profile.mem_vol,
            req_energy: profile.req_energy,
            profile_name,
            tasks,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(Task::is_finished)
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_finite()
    }

    /// Sets `start_time` to the minimum of its current value and `now`;
    /// the first task placed on a resource establishes the job's start.
    pub fn mark_started(&mut self, now: Time) {
        if now < self.start_time {
            self.start_time = now;
        }
    }

    pub fn slowdown(&self) -> f64 {
        let denom = (self.finish_time - self.start_time).0;
        if denom == 0.0 {
            tracing::warn!(job = %self.name, "job has zero execution time, substituting 1 for slowdown denominator");
            (self.finish_time - self.submit_time).0
        } else {
            (self.finish_time - self.submit_time).0 / denom
        }
    }

    pub fn bounded_slowdown(&self) -> f64 {
        let denom = (self.finish_time - self.start_time).0.max(10.0);
        ((self.finish_time - self.submit_time).0 / denom).max(1.0)
    }

    pub fn waiting_time(&self) -> Duration {
        self.start_time - self.submit_time
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    /// future_jobs is a min-heap by submit_time, ties broken by id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.submit_time
            .cmp(&other.submit_time)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            req_ops: 1.0e9,
            ipc: 1.0,
            req_time: Duration(10.0),
            mem: 0.0,
            mem_vol: 0.0,
            req_energy: None,
        }
    }

    #[test]
    fn builds_one_task_per_ntasks() {
        let job = Job::new(0, "j".into(), Time(0.0), 2, 4, 2, &profile(), None).unwrap();
        assert_eq!(job.tasks.len(), 4);
        assert_eq!(job.tasks[0].ops, 1.0e9);
    }

    #[test]
    fn rejects_incompatible_task_layout() {
        let err = Job::new(0, "j".into(), Time(0.0), 1, 4, 2, &profile(), None).unwrap_err();
        assert!(matches!(err, Error::WorkloadValidation { .. }));
    }

    #[test]
    fn mark_started_keeps_the_earliest_placement_time() {
        let mut job = Job::new(0, "j".into(), Time(0.0), 1, 1, 1, &profile(), None).unwrap();
        job.mark_started(Time(5.0));
        job.mark_started(Time(2.0));
        job.mark_started(Time(9.0));
        assert_eq!(job.start_time, Time(2.0));
    }
}
