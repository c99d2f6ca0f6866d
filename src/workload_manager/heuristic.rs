//! Whole-node placement with a configurable job/node ordering, grounded
//! on `workload_manager/Heuristic.py`.

use std::collections::VecDeque;

use super::{Placement, WorkloadManager};
use crate::config::WorkloadManagerConfig;
use crate::job_queue::JobQueue;
use crate::platform::{NodeSummary, Platform};
use crate::time::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSelection {
    First,
    Random,
    HighGflops,
    HighCores,
    HighMem,
    HighMemBw,
    LowPower,
}

impl NodeSelection {
    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("random") => NodeSelection::Random,
            Some("high_gflops") => NodeSelection::HighGflops,
            Some("high_cores") => NodeSelection::HighCores,
            Some("high_mem") => NodeSelection::HighMem,
            Some("high_mem_bw") => NodeSelection::HighMemBw,
            Some("low_power") => NodeSelection::LowPower,
            _ => NodeSelection::First,
        }
    }

    fn key(&self, n: &NodeSummary) -> f64 {
        match self {
            NodeSelection::First | NodeSelection::Random => 0.0,
            NodeSelection::HighGflops => -n.mops_per_core,
            NodeSelection::HighCores => -(n.idle_cores as f64),
            NodeSelection::HighMem => 0.0,
            NodeSelection::HighMemBw => n.requested_bw,
            NodeSelection::LowPower => -((n.static_power + n.dynamic_power) * n.total_cores as f64),
        }
    }
}

pub struct Heuristic {
    node_selection: NodeSelection,
    pending: VecDeque<u64>,
}

impl Heuristic {
    pub fn new(config: &WorkloadManagerConfig) -> Self {
        Heuristic {
            node_selection: NodeSelection::parse(config.resource_selection.as_deref()),
            pending: VecDeque::new(),
        }
    }

    fn schedule_pending(&mut self, queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        let mut placements = Vec::new();

        while let Some(&job_id) = self.pending.front() {
            let Some(job) = queue.submitted().iter().find(|j| j.id == job_id) else {
                self.pending.pop_front();
                continue;
            };

            let mut viable: Vec<NodeSummary> = platform
                .schedulable_nodes()
                .into_iter()
                .filter(|n| n.idle_cores >= job.ntasks_per_node)
                .collect();
            if (viable.len() as u32) < job.nodes {
                break;
            }
            viable.sort_by(|a, b| self.node_selection.key(a).total_cmp(&self.node_selection.key(b)));

            let mut slots = Vec::with_capacity(job.tasks.len());
            'nodes: for node in &viable {
                let Ok(idle) = platform.idle_slots(&node.path) else { continue };
                for slot in idle.into_iter().take(job.ntasks_per_node as usize) {
                    slots.push(slot);
                    if slots.len() == job.tasks.len() {
                        break 'nodes;
                    }
                }
            }
            if slots.len() < job.tasks.len() {
                break;
            }

            placements.extend(super::pair_tasks_with_slots(job_id, queue, &slots));
            self.pending.pop_front();
        }
        placements
    }
}

impl WorkloadManager for Heuristic {
    fn on_job_submission(&mut self, _now: Time, jobs: &[u64], queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        self.pending.extend(jobs);
        self.schedule_pending(queue, platform)
    }

    fn on_job_completion(&mut self, _now: Time, _jobs: &[u64], queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        self.schedule_pending(queue, platform)
    }
}
