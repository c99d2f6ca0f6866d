//! Energy/EDP-minimizing whole-node placement, grounded on
//! `workload_manager/Energy.py`.

use std::collections::HashMap;

use super::{Placement, WorkloadManager};
use crate::config::WorkloadManagerConfig;
use crate::job::Job;
use crate::job_queue::JobQueue;
use crate::platform::{NodeSummary, Platform};
use crate::time::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Criterion {
    Energy,
    Edp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Priority {
    LowFirst,
    HighFirst,
}

pub struct Energy {
    criterion: Criterion,
    job_prio: Priority,
    node_prio: Priority,
    assigned_nodes: HashMap<Vec<String>, u32>,
    pending: Vec<u64>,
}

impl Energy {
    pub fn new(config: &WorkloadManagerConfig) -> Self {
        let criterion = match config.criterion.as_deref() {
            Some("edp") => Criterion::Edp,
            _ => Criterion::Energy,
        };
        let parse_prio = |s: Option<&str>| match s {
            Some("hi_first") => Priority::HighFirst,
            _ => Priority::LowFirst,
        };
        Energy {
            criterion,
            job_prio: parse_prio(config.job_prio.as_deref()),
            node_prio: parse_prio(config.node_prio.as_deref()),
            assigned_nodes: HashMap::new(),
            pending: Vec::new(),
        }
    }

    fn job_key(&self, job: &Job) -> f64 {
        let req_energy = job.req_energy.unwrap_or(0.0);
        let base = match self.criterion {
            Criterion::Energy => req_energy * job.ntasks as f64,
            Criterion::Edp => req_energy * job.req_time.0 * job.ntasks as f64,
        };
        match self.job_prio {
            Priority::LowFirst => base,
            Priority::HighFirst => -base,
        }
    }

    fn estimate_speedup(&self, min_freq: f64, node: &NodeSummary) -> f64 {
        let freq_speedup = min_freq / node.clock_rate;
        let inverted_dpflops = (node.clock_rate * 1e3) / node.mops_per_core;
        freq_speedup * inverted_dpflops
    }

    fn node_energy(&self, job: &Job, node: &NodeSummary) -> f64 {
        let dyn_fraction = node.dynamic_power * job.ntasks as f64;
        let running = *self.assigned_nodes.get(&node.path).unwrap_or(&0) as f64;
        let static_fraction = (node.static_power * node.total_cores as f64) / (running + 1.0);
        let min_freq = node.clock_rate;
        let node_time = job.req_time.0 * self.estimate_speedup(min_freq, node);
        node_time * (dyn_fraction + static_fraction)
    }

    fn node_cost(&self, job: &Job, node: &NodeSummary) -> f64 {
        let energy = self.node_energy(job, node);
        let cost = match self.criterion {
            Criterion::Energy => energy,
            Criterion::Edp => {
                let node_time = job.req_time.0 * self.estimate_speedup(node.clock_rate, node);
                energy * node_time
            }
        };
        match self.node_prio {
            Priority::LowFirst => cost,
            Priority::HighFirst => -cost,
        }
    }

    fn select_node(&self, job: &Job, nodes: &[NodeSummary]) -> Option<NodeSummary> {
        nodes
            .iter()
            .filter(|n| n.idle_cores >= job.ntasks_per_node)
            .min_by(|a, b| self.node_cost(job, a).total_cmp(&self.node_cost(job, b)))
            .cloned()
    }

    fn schedule_pending(&mut self, queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        let mut jobs: Vec<&Job> = self
            .pending
            .iter()
            .filter_map(|id| queue.submitted().iter().find(|j| j.id == *id))
            .collect();
        jobs.sort_by(|a, b| self.job_key(a).total_cmp(&self.job_key(b)));

        let nodes = platform.schedulable_nodes();
        let mut placements = Vec::new();
        let mut scheduled = Vec::new();

        for job in jobs {
            let Some(node) = self.select_node(job, &nodes) else { continue };
            let Ok(slots) = platform.idle_slots(&node.path) else { continue };
            if slots.len() < job.tasks.len() {
                continue;
            }
            let slots = &slots[..job.tasks.len()];
            placements.extend(super::pair_tasks_with_slots(job.id, queue, slots));
            *self.assigned_nodes.entry(node.path.clone()).or_insert(0) += 1;
            scheduled.push(job.id);
        }

        self.pending.retain(|id| !scheduled.contains(id));
        placements
    }
}

impl WorkloadManager for Energy {
    fn on_job_submission(&mut self, _now: Time, jobs: &[u64], queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        self.pending.extend(jobs);
        self.schedule_pending(queue, platform)
    }

    fn on_job_completion(&mut self, _now: Time, _jobs: &[u64], queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        self.schedule_pending(queue, platform)
    }
}
