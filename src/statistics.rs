//! End-of-trajectory and per-step summary metrics, grounded on
//! `Statistics.py` and `Simulator.header`/`log_state` (spec.md §4.7,
//! §6 "Log files"). Per-step rows are emitted into `simulation.log` at
//! every `on_end_step`; the `Summary` is written once as
//! `statistics.json` after the trajectory drains.

use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

use crate::job::Job;
use crate::time::Time;

/// total/avg/max/min over a list-valued metric, matching the four
/// `_total/_avg/_max/_min` columns spec.md §6 assigns to each metric.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Aggregate {
    pub total: f64,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

impl Aggregate {
    fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Aggregate::default();
        }
        let total: f64 = values.iter().sum();
        let (min, max) = match values.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
            MinMaxResult::NoElements => unreachable!("checked non-empty above"),
        };
        Aggregate { total, avg: total / values.len() as f64, max, min }
    }
}

/// One row of `simulation.log`, matching spec.md §6's column order.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub run: u32,
    pub time: f64,
    pub energy: f64,
    pub future: usize,
    pub pending: usize,
    pub running: usize,
    pub finished: usize,
    pub slowdown_total: f64,
    pub slowdown_avg: f64,
    pub slowdown_max: f64,
    pub slowdown_min: f64,
    pub bounded_slowdown_total: f64,
    pub bounded_slowdown_avg: f64,
    pub bounded_slowdown_max: f64,
    pub bounded_slowdown_min: f64,
    pub waiting_time_total: f64,
    pub waiting_time_avg: f64,
    pub waiting_time_max: f64,
    pub waiting_time_min: f64,
}

impl StepRecord {
    pub fn new(run: u32, time: Time, energy: f64, future: usize, pending: usize, running: usize, finished: &[Job]) -> Self {
        let slowdown = Aggregate::of(&finished.iter().map(Job::slowdown).collect::<Vec<_>>());
        let bounded = Aggregate::of(&finished.iter().map(Job::bounded_slowdown).collect::<Vec<_>>());
        let waiting = Aggregate::of(&finished.iter().map(|j| j.waiting_time().0).collect::<Vec<_>>());
        StepRecord {
            run,
            time: time.0,
            energy,
            future,
            pending,
            running,
            finished: finished.len(),
            slowdown_total: slowdown.total,
            slowdown_avg: slowdown.avg,
            slowdown_max: slowdown.max,
            slowdown_min: slowdown.min,
            bounded_slowdown_total: bounded.total,
            bounded_slowdown_avg: bounded.avg,
            bounded_slowdown_max: bounded.max,
            bounded_slowdown_min: bounded.min,
            waiting_time_total: waiting.total,
            waiting_time_avg: waiting.avg,
            waiting_time_max: waiting.max,
            waiting_time_min: waiting.min,
        }
    }
}

/// One row of `jobs.log`, one per finished job's sole/aggregate task
/// bookkeeping, matching spec.md §6.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub run: u32,
    pub name: String,
    pub req_time: f64,
    pub ntasks: u32,
    pub mem: f64,
    pub submit: f64,
    pub start: f64,
    pub finish: f64,
    pub execution: f64,
    pub operations: f64,
    pub mem_vol: f64,
    pub profile: String,
    pub resource_path: String,
}

impl JobRecord {
    pub fn from_job(run: u32, job: &Job) -> Vec<Self> {
        job.tasks
            .iter()
            .map(|task| JobRecord {
                run,
                name: format!("{}.{}", job.name, task.task_id),
                req_time: job.req_time.0,
                ntasks: job.ntasks,
                mem: task.memory,
                submit: job.submit_time.0,
                start: job.start_time.0,
                finish: job.finish_time.0,
                execution: task.execution_time.0,
                operations: task.req_ops,
                mem_vol: task.memory_volume,
                profile: job.profile_name.clone().unwrap_or_default(),
                resource_path: task.placement.as_ref().map(|p| p.join("/")).unwrap_or_default(),
            })
            .collect()
    }
}

/// One row of the optional `resources.log`, one per schedulable node per
/// step, matching the `id,cores,busy_cores` shape generalized from
/// `modelV1/Node.py`'s `header()`/`log_state()` classmethods.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceRecord {
    pub run: u32,
    pub time: f64,
    pub id: String,
    pub cores: u32,
    pub busy_cores: u32,
}

impl ResourceRecord {
    pub fn from_node(run: u32, time: Time, node: &crate::platform::NodeSummary) -> Self {
        ResourceRecord {
            run,
            time: time.0,
            id: node.path.join("/"),
            cores: node.total_cores,
            busy_cores: node.total_cores - node.idle_cores,
        }
    }
}

/// End-of-trajectory `statistics.json` summary, grounded on
/// `Statistics.py`'s `Energy_Consumed`/`EDP`/`Makespan` fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub energy_consumed: f64,
    pub edp: f64,
    pub makespan: f64,
    pub slowdown: Aggregate,
    pub bounded_slowdown: Aggregate,
    pub waiting_time: Aggregate,
}

impl Summary {
    pub fn compute(finished: &[Job], total_energy: f64) -> Self {
        let makespan = finished.iter().map(|j| j.finish_time.0).fold(0.0, f64::max);
        Summary {
            energy_consumed: total_energy,
            edp: total_energy * makespan,
            makespan,
            slowdown: Aggregate::of(&finished.iter().map(Job::slowdown).collect::<Vec<_>>()),
            bounded_slowdown: Aggregate::of(&finished.iter().map(Job::bounded_slowdown).collect::<Vec<_>>()),
            waiting_time: Aggregate::of(&finished.iter().map(|j| j.waiting_time().0).collect::<Vec<_>>()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Profile;

    fn finished_job(id: u64, submit: f64, start: f64, finish: f64) -> Job {
        let profile = Profile { req_ops: 1.0, ipc: 1.0, req_time: crate::time::Duration(finish - start), mem: 0.0, mem_vol: 0.0, req_energy: None };
        let mut job = Job::new(id, format!("j{id}"), Time(submit), 1, 1, 1, &profile, None).unwrap();
        job.start_time = Time(start);
        job.finish_time = Time(finish);
        job
    }

    #[test]
    fn aggregate_of_empty_is_all_zero() {
        let agg = Aggregate::of(&[]);
        assert_eq!(agg.total, 0.0);
        assert_eq!(agg.max, 0.0);
    }

    #[test]
    fn summary_makespan_is_the_last_finish_time() {
        let jobs = vec![finished_job(0, 0.0, 0.0, 3.0), finished_job(1, 1.0, 2.0, 5.0)];
        let summary = Summary::compute(&jobs, 100.0);
        assert_eq!(summary.makespan, 5.0);
        assert_eq!(summary.edp, 500.0);
    }
}
