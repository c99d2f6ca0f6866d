//! Job bookkeeping across the three lifecycle partitions, grounded on
//! `original_source/irmasim/JobQueue.py`: jobs not yet submitted, jobs
//! submitted and awaiting/undergoing execution, and jobs that finished.

use std::collections::BinaryHeap;

use crate::job::Job;
use crate::time::Time;

/// Wraps a `Job` so `BinaryHeap` (a max-heap) orders by *earliest*
/// submit_time first, matching the min-heap `future_jobs` of the original.
struct ByEarliestSubmit(Job);

impl PartialEq for ByEarliestSubmit {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for ByEarliestSubmit {}
impl PartialOrd for ByEarliestSubmit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ByEarliestSubmit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.0.cmp(&self.0)
    }
}

#[derive(Default)]
pub struct JobQueue {
    future: BinaryHeap<ByEarliestSubmit>,
    submitted: Vec<Job>,
    finished: Vec<Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, job: Job) {
        self.future.push(ByEarliestSubmit(job));
    }

    /// Time at which the next not-yet-submitted job arrives, or `None`
    /// if every job has already been submitted.
    pub fn next_submit_time(&self) -> Option<Time> {
        self.future.peek().map(|j| j.0.submit_time)
    }

    /// Moves every job whose submit_time is `<= now` from `future` into
    /// `submitted`, returning them in submit-time order. Empty when there
    /// is nothing to admit yet -- this is a normal outcome, not an error
    /// (unlike the original, which raises when called on an empty queue).
    pub fn pop_arrived(&mut self, now: Time) -> Vec<&Job> {
        let mut arrived_ids = Vec::new();
        while let Some(top) = self.future.peek() {
            if top.0.submit_time > now {
                break;
            }
            let ByEarliestSubmit(job) = self.future.pop().unwrap();
            arrived_ids.push(job.id);
            self.submitted.push(job);
        }
        self.submitted
            .iter()
            .filter(|j| arrived_ids.contains(&j.id))
            .collect()
    }

    pub fn submitted(&self) -> &[Job] {
        &self.submitted
    }

    pub fn submitted_mut(&mut self) -> &mut [Job] {
        &mut self.submitted
    }

    /// Drains every submitted job that has finished into the `finished`
    /// partition, returning how many were moved.
    pub fn collect_finished(&mut self) -> usize {
        let (done, pending): (Vec<Job>, Vec<Job>) =
            self.submitted.drain(..).partition(Job::is_finished);
        let n = done.len();
        self.finished.extend(done);
        self.submitted = pending;
        n
    }

    pub fn finished(&self) -> &[Job] {
        &self.finished
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.future.len(), self.submitted.len(), self.finished.len())
    }

    pub fn is_drained(&self) -> bool {
        self.future.is_empty() && self.submitted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Profile;
    use crate::time::Duration;

    fn profile() -> Profile {
        Profile {
            req_ops: 1.0,
            ipc: 1.0,
            req_time: Duration(1.0),
            mem: 0.0,
            mem_vol: 0.0,
            req_energy: None,
        }
    }

    fn job(id: u64, submit: f64) -> Job {
        Job::new(id, format!("j{id}"), Time(submit), 1, 1, 1, &profile(), None).unwrap()
    }

    #[test]
    fn pop_arrived_respects_submit_time_ordering() {
        let mut q = JobQueue::new();
        q.add(job(2, 5.0));
        q.add(job(1, 2.0));
        q.add(job(3, 10.0));

        assert_eq!(q.next_submit_time(), Some(Time(2.0)));
        let arrived = q.pop_arrived(Time(5.0));
        assert_eq!(arrived.len(), 2);
        assert_eq!(arrived[0].id, 1);
        assert_eq!(arrived[1].id, 2);
        assert_eq!(q.next_submit_time(), Some(Time(10.0)));
    }

    #[test]
    fn pop_arrived_on_empty_queue_is_not_an_error() {
        let mut q = JobQueue::new();
        assert!(q.pop_arrived(Time(0.0)).is_empty());
    }

    #[test]
    fn collect_finished_moves_only_finished_jobs() {
        let mut q = JobQueue::new();
        q.add(job(1, 0.0));
        q.pop_arrived(Time(0.0));
        q.submitted_mut()[0].tasks[0].ops = 0.0;
        assert_eq!(q.collect_finished(), 1);
        assert_eq!(q.finished().len(), 1);
        assert_eq!(q.counts(), (0, 0, 1));
    }
}
