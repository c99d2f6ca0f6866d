//! First-come-first-served over a flat resource pool, grounded on
//! `workload_manager/Basic.py`: no node concept, just idle leaves handed
//! out in enumeration order.

use std::collections::VecDeque;

use super::{Placement, WorkloadManager};
use crate::job_queue::JobQueue;
use crate::platform::Platform;
use crate::time::Time;

#[derive(Default)]
pub struct Basic {
    pending: VecDeque<u64>,
}

impl Basic {
    pub fn new() -> Self {
        Basic::default()
    }

    fn schedule_pending(&mut self, queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        let mut placements = Vec::new();
        let mut idle: Vec<Vec<String>> = platform
            .enumerate_ids()
            .into_iter()
            .filter(|path| platform.idle_at(path))
            .collect();

        while let Some(&job_id) = self.pending.front() {
            let Some(job) = queue.submitted().iter().find(|j| j.id == job_id) else {
                self.pending.pop_front();
                continue;
            };
            if idle.len() < job.tasks.len() {
                break;
            }
            let slots: Vec<Vec<String>> = idle.drain(..job.tasks.len()).collect();
            placements.extend(super::pair_tasks_with_slots(job_id, queue, &slots));
            self.pending.pop_front();
        }
        placements
    }
}

impl WorkloadManager for Basic {
    fn on_job_submission(&mut self, _now: Time, jobs: &[u64], queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        self.pending.extend(jobs);
        self.schedule_pending(queue, platform)
    }

    fn on_job_completion(&mut self, _now: Time, _jobs: &[u64], queue: &JobQueue, platform: &Platform) -> Vec<Placement> {
        self.schedule_pending(queue, platform)
    }
}
