//! The event-driven simulation loop, grounded on `Simulator.py`'s
//! `run_simulation` and spec.md §4.4: interleave job arrivals and task
//! completions at the smallest of their two next event times, notifying
//! the workload manager at each step boundary.

use crate::error::{Error, ErrorKind, Kind as _, Result};
use crate::job::Job;
use crate::job_queue::JobQueue;
use crate::logging::RunLogs;
use crate::platform::{Completion, Platform, Progress};
use crate::statistics::{JobRecord, StepRecord, Summary};
use crate::time::{Duration, Time};
use crate::workload_manager::{Placement, Policy, WorkloadManager};

pub struct Simulator {
    platform: Platform,
    queue: JobQueue,
    policy: Policy,
    now: Time,
    energy: f64,
    run: u32,
    logs: RunLogs,
}

impl Simulator {
    pub fn new(platform: Platform, queue: JobQueue, policy: Policy, run: u32, logs: RunLogs) -> Self {
        Simulator { platform, queue, policy, now: Time(0.0), energy: 0.0, run, logs }
    }

    /// Runs the trajectory to completion (spec.md §4.4 steps 1-4),
    /// returning the end-of-trajectory summary. Terminates naturally once
    /// both the future queue and every leaf are idle.
    pub fn run(&mut self) -> Result<Summary> {
        let Some(first_submit) = self.queue.next_submit_time() else {
            return Ok(Summary::default());
        };

        let dt0 = first_submit - self.now;
        self.energy += self.platform.joules(dt0);
        self.now = first_submit;
        self.notify_arrivals()?;
        self.notify_end_step();
        self.log_step();

        loop {
            let platform_dt = self.platform.next_step();
            let queue_dt = self
                .queue
                .next_submit_time()
                .map(|t| t - self.now)
                .unwrap_or_else(Duration::infinite);
            let dt = platform_dt.min(queue_dt);
            if !dt.is_finite() {
                break;
            }

            let mut completions = Vec::new();
            if dt.0 > 0.0 {
                self.energy += self.platform.joules(dt);
                let (progress, c) = self.platform.advance(dt);
                self.apply_progress(&progress, dt);
                completions = c;
            }
            self.now += dt;

            let mut fired = false;
            if self.notify_arrivals()? {
                fired = true;
            }
            if !completions.is_empty() {
                self.notify_completions(completions)?;
                fired = true;
            }
            if fired {
                self.notify_end_step();
                self.log_step();
            }
        }

        Ok(Summary::compute(self.queue.finished(), self.energy))
    }

    fn apply_progress(&mut self, progress: &[Progress], dt: Duration) {
        for p in progress {
            if let Some(job) = self.queue.submitted_mut().iter_mut().find(|j| j.id == p.job_id) {
                if let Some(task) = job.tasks.iter_mut().find(|t| t.task_id == p.task_id) {
                    task.advance(dt, p.delta_ops);
                }
            }
        }
    }

    /// Drains and dispatches any jobs arriving exactly at `self.now`.
    /// Returns whether any did, so the caller knows to fire `on_end_step`.
    fn notify_arrivals(&mut self) -> Result<bool> {
        let arrived_ids: Vec<u64> = self.queue.pop_arrived(self.now).iter().map(|j| j.id).collect();
        if arrived_ids.is_empty() {
            return Ok(false);
        }
        let placements = self.policy.on_job_submission(self.now, &arrived_ids, &self.queue, &self.platform);
        self.apply_placements(placements)?;
        Ok(true)
    }

    fn notify_completions(&mut self, completions: Vec<Completion>) -> Result<()> {
        for c in &completions {
            self.platform.reap(&c.path, c.job_id, c.task_id)?;
        }

        let now = self.now;
        for job in self.queue.submitted_mut() {
            if job.is_finished() && !job.finish_time.is_finite() {
                job.finish_time = now;
            }
        }

        let before = self.queue.finished().len();
        self.queue.collect_finished();
        let newly_finished: Vec<Job> = self.queue.finished()[before..].to_vec();
        for job in &newly_finished {
            self.log_job(job);
        }
        let newly_finished_ids: Vec<u64> = newly_finished.iter().map(|j| j.id).collect();

        let placements = self
            .policy
            .on_job_completion(self.now, &newly_finished_ids, &self.queue, &self.platform);
        self.apply_placements(placements)
    }

    fn notify_end_step(&mut self) {
        self.policy.on_end_step(self.now, &self.queue, &self.platform);
    }

    fn apply_placements(&mut self, placements: Vec<Placement>) -> Result<()> {
        for p in placements {
            let (ops, mem_vol, mem) = {
                let job = self
                    .queue
                    .submitted()
                    .iter()
                    .find(|j| j.id == p.job_id)
                    .ok_or_else(|| Error::not_placed(&p.path))?;
                let task = job
                    .tasks
                    .iter()
                    .find(|t| t.task_id == p.task_id)
                    .ok_or_else(|| Error::not_placed(&p.path))?;
                (task.ops, task.memory_volume, task.memory)
            };
            self.platform.schedule(&p.path, p.job_id, p.task_id, ops, mem_vol, mem)?;
            if let Some(job) = self.queue.submitted_mut().iter_mut().find(|j| j.id == p.job_id) {
                job.mark_started(self.now);
                if let Some(task) = job.tasks.iter_mut().find(|t| t.task_id == p.task_id) {
                    task.placement = Some(p.path.clone());
                }
            }
        }
        Ok(())
    }

    fn log_step(&mut self) {
        let (future, _submitted, _finished) = self.queue.counts();
        let pending = self.queue.submitted().iter().filter(|j| !j.is_started()).count();
        let running = self.queue.submitted().iter().filter(|j| j.is_started()).count();
        let record = StepRecord::new(self.run, self.now, self.energy, future, pending, running, self.queue.finished());
        if let Err(e) = self.logs.simulation.serialize(&record) {
            tracing::warn!(error = %e, "failed to write simulation.log row");
        }
        let _ = self.logs.simulation.flush();

        if let Some(resources) = &mut self.logs.resources {
            for node in self.platform.schedulable_nodes() {
                let row = crate::statistics::ResourceRecord::from_node(self.run, self.now, &node);
                if let Err(e) = resources.serialize(&row) {
                    tracing::warn!(error = %e, "failed to write resources.log row");
                }
            }
            let _ = resources.flush();
        }
    }

    fn log_job(&mut self, job: &Job) {
        for row in JobRecord::from_job(self.run, job) {
            if let Err(e) = self.logs.jobs.serialize(&row) {
                tracing::warn!(error = %e, "failed to write jobs.log row");
            }
        }
        let _ = self.logs.jobs.flush();
    }
}

/// Builds a [`Simulator`] from an already-loaded platform/workload/policy,
/// runs one trajectory end to end, and writes the three CSV logs plus a
/// final `statistics.json` summary to `output_dir`.
pub fn run_trajectory(
    platform: Platform,
    queue: JobQueue,
    policy: Policy,
    run: u32,
    output_dir: &std::path::Path,
    log_resources: bool,
) -> Result<Summary> {
    let logs = RunLogs::create(output_dir, run, log_resources)?;
    let mut sim = Simulator::new(platform, queue, policy, run, logs);
    let summary = sim.run()?;

    let summary_path = output_dir.join(format!("run{}-statistics.json", run));
    let contents = serde_json::to_string_pretty(&summary).kind(ErrorKind::StatisticsSummary)?;
    std::fs::write(&summary_path, contents).kind(ErrorKind::StatisticsSummary)?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Profile;
    use crate::platform::contention::{PowerConstants, SmootherstepConstants};
    use crate::platform::{CoreLeaf, NodeKind, ResourceNode};
    use crate::workload_manager::basic::Basic;

    fn single_core_platform() -> Platform {
        let k = SmootherstepConstants { b: 0.1, c: 10.0, da: 8.0, db: 1.0, dc: 20.0, dd: 1.0 };
        let core = ResourceNode {
            id: "core0".into(),
            parent: Some(2),
            children: vec![],
            kind: NodeKind::CoreLeaf(CoreLeaf {
                mops_per_core: 1000.0,
                constants: k,
                power: PowerConstants { dynamic_power: 100.0, static_power: 50.0, min_power: 0.05 },
                task: None,
                speedup: 1.0,
            }),
        };
        let proc = ResourceNode { id: "proc0".into(), parent: Some(1), children: vec![3], kind: NodeKind::Processor(k) };
        let node = ResourceNode { id: "node0".into(), parent: Some(0), children: vec![2], kind: NodeKind::Inner };
        let root = ResourceNode { id: "platform".into(), parent: None, children: vec![1], kind: NodeKind::Inner };
        Platform::from_nodes(vec![root, node, proc, core])
    }

    fn temp_dir(label: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("irmasim-sim-test-{}-{}", std::process::id(), label));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn single_core_single_job_matches_scenario_makespan_and_energy() {
        let platform = single_core_platform();
        let mut queue = JobQueue::new();
        let profile = Profile { req_ops: 1.0e9, ipc: 1.0, req_time: Duration(10.0), mem: 0.0, mem_vol: 0.0, req_energy: None };
        queue.add(Job::new(0, "j".into(), Time(2.0), 1, 1, 1, &profile, None).unwrap());

        let policy = Policy::Basic(Basic::new());
        let dir = temp_dir("scenario1");
        let summary = run_trajectory(platform, queue, policy, 0, &dir, false).unwrap();

        assert!((summary.makespan - 3.0).abs() < 1e-6);
        assert!((summary.energy_consumed - 155.0).abs() < 1e-6);
    }

    #[test]
    fn empty_workload_finishes_immediately() {
        let platform = single_core_platform();
        let queue = JobQueue::new();
        let policy = Policy::Basic(Basic::new());
        let dir = temp_dir("empty");
        let summary = run_trajectory(platform, queue, policy, 1, &dir, false).unwrap();
        assert_eq!(summary.makespan, 0.0);
        assert_eq!(summary.energy_consumed, 0.0);
    }

    #[test]
    fn two_jobs_queue_behind_the_single_core() {
        let platform = single_core_platform();
        let mut queue = JobQueue::new();
        let profile = Profile { req_ops: 1.0e9, ipc: 1.0, req_time: Duration(10.0), mem: 0.0, mem_vol: 0.0, req_energy: None };
        queue.add(Job::new(0, "a".into(), Time(0.0), 1, 1, 1, &profile, None).unwrap());
        queue.add(Job::new(1, "b".into(), Time(0.0), 1, 1, 1, &profile, None).unwrap());

        let policy = Policy::Basic(Basic::new());
        let dir = temp_dir("queued");
        let summary = run_trajectory(platform, queue, policy, 2, &dir, false).unwrap();

        // job a runs [0,1), job b queues until a finishes and runs [1,2)
        assert!((summary.makespan - 2.0).abs() < 1e-6);
    }
}
