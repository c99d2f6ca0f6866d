//! Discrete-event simulator for job-scheduling and resource-management
//! policies on heterogeneous HPC clusters.
//!
//! [`run`] is the single entry point the CLI binary drives: load the
//! configured platform and workload, then replay `nbtrajectories`
//! independent trajectories through [`simulator::run_trajectory`].

pub mod config;
pub mod error;
pub mod job;
pub mod job_queue;
pub mod loader;
pub mod logging;
pub mod platform;
pub mod simulator;
pub mod statistics;
pub mod task;
pub mod time;
pub mod workload_manager;

use rand::Rng;
use rand_seeder::{Seeder, SipRng};

use config::{AppConfig, SimConfig};
use error::{Error, Result};
use job_queue::JobQueue;
use time::Time;
use workload_manager::Policy;

/// Runs every configured trajectory to completion, writing each run's
/// logs and summary under `output_dir`. Returns the first error
/// encountered; spec.md §6's "non-zero on configuration or JSON errors"
/// exit-code contract is enforced by the CLI translating this `Result`.
pub fn run() -> Result<()> {
    let config = AppConfig::fetch()?;
    let library = loader::platform::TypeLibrary::load(&config.platform_library_path)?;
    let platform_file = config
        .platform_file
        .as_ref()
        .ok_or_else(|| Error::config("no platform_file configured"))?;
    let description = loader::platform::PlatformDescription::load(platform_file)?;

    let mut rng: SipRng = Seeder::from(config.seed).make_rng();

    for run_index in 0..config.nbtrajectories {
        run_trajectory(&config, &description, &library, run_index, &mut rng)?;
    }
    Ok(())
}

fn run_trajectory(
    config: &SimConfig,
    description: &loader::platform::PlatformDescription,
    library: &loader::platform::TypeLibrary,
    run_index: u32,
    rng: &mut SipRng,
) -> Result<()> {
    let full = loader::workload::load(&config.workload_file, config.allow_zero_req_time)?;
    let queue = select_trajectory(full, &config.trajectory_origin, &config.trajectory_length, rng);
    let policy = Policy::from_config(&config.workload_manager)?;
    let platform = platform::builder::build(description, library)?;

    simulator::run_trajectory(
        platform,
        queue,
        policy,
        run_index,
        &config.output_dir,
        config.log_resource_type.is_some(),
    )
    .map(|_| ())
}

/// Picks the contiguous, submit-time-ordered window of jobs this
/// trajectory replays out of the full workload, per spec.md §6's
/// `trajectory_origin`/`trajectory_length` knobs (`"random"`, an
/// integer, or `"0"` meaning "all remaining" for length).
fn select_trajectory(mut full: JobQueue, origin: &str, length: &str, rng: &mut SipRng) -> JobQueue {
    full.pop_arrived(Time::infinite());
    let total = full.submitted().len();

    let origin_idx = match origin {
        "random" if total > 0 => rng.gen_range(0..total),
        "random" => 0,
        s => s.parse::<usize>().unwrap_or(0).min(total.saturating_sub(1)),
    };
    let remaining = total.saturating_sub(origin_idx);
    let window = match length {
        "0" => remaining,
        "random" if remaining > 0 => rng.gen_range(1..=remaining),
        "random" => 0,
        s => s.parse::<usize>().unwrap_or(remaining).min(remaining),
    };

    let mut selected = JobQueue::new();
    for job in full.submitted().iter().skip(origin_idx).take(window) {
        selected.add(job.clone());
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, Profile};

    fn profile() -> Profile {
        Profile { req_ops: 1.0, ipc: 1.0, req_time: time::Duration(1.0), mem: 0.0, mem_vol: 0.0, req_energy: None }
    }

    fn queue_of(n: usize) -> JobQueue {
        let mut q = JobQueue::new();
        for i in 0..n {
            q.add(Job::new(i as u64, format!("j{i}"), Time(i as f64), 1, 1, 1, &profile(), None).unwrap());
        }
        q
    }

    #[test]
    fn length_zero_means_all_remaining_from_origin() {
        let mut rng: SipRng = Seeder::from(0u64).make_rng();
        let selected = select_trajectory(queue_of(5), "2", "0", &mut rng);
        assert_eq!(selected.counts().0, 3);
    }

    #[test]
    fn explicit_origin_and_length_select_a_slice() {
        let mut rng: SipRng = Seeder::from(0u64).make_rng();
        let selected = select_trajectory(queue_of(5), "1", "2", &mut rng);
        assert_eq!(selected.counts().0, 2);
    }

    #[test]
    fn origin_past_the_end_clamps_to_the_last_job() {
        let mut rng: SipRng = Seeder::from(0u64).make_rng();
        let selected = select_trajectory(queue_of(3), "99", "0", &mut rng);
        assert_eq!(selected.counts().0, 1);
    }
}
