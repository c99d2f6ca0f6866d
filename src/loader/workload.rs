//! Workload JSON parsing, grounded on `Simulator.generate_workload`:
//! each job either inlines its profile fields or references one from
//! the `profiles` map, and `res` is shorthand for a single-node,
//! single-task-per-node job.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, ErrorKind, Kind as _, Result};
use crate::job::{Job, Profile};
use crate::job_queue::JobQueue;
use crate::time::{Duration, Time};

#[derive(Debug, Clone, Deserialize)]
struct ProfileSpec {
    req_ops: f64,
    #[serde(default = "one")]
    ipc: f64,
    req_time: f64,
    #[serde(default)]
    mem: f64,
    #[serde(default)]
    mem_vol: f64,
    req_energy: Option<f64>,
}

fn one() -> f64 {
    1.0
}

impl From<ProfileSpec> for Profile {
    fn from(p: ProfileSpec) -> Self {
        Profile {
            req_ops: p.req_ops,
            ipc: p.ipc,
            req_time: Duration(p.req_time),
            mem: p.mem,
            mem_vol: p.mem_vol,
            req_energy: p.req_energy,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct JobSpec {
    id: Option<String>,
    subtime: f64,
    res: Option<u32>,
    nodes: Option<u32>,
    ntasks: Option<u32>,
    ntasks_per_node: Option<u32>,
    profile: Option<String>,
    #[serde(flatten)]
    inline: Value,
}

#[derive(Debug, Deserialize)]
struct WorkloadSpec {
    #[serde(default)]
    profiles: std::collections::HashMap<String, ProfileSpec>,
    jobs: Vec<JobSpec>,
}

/// Parses a workload file into a freshly populated [`JobQueue`].
pub fn load(path: &Path, allow_zero_req_time: bool) -> Result<JobQueue> {
    let contents = std::fs::read_to_string(path).kind(ErrorKind::WorkloadLoad)?;
    let spec: WorkloadSpec = serde_json::from_str(&contents).kind(ErrorKind::WorkloadLoad)?;

    let mut queue = JobQueue::new();
    for (idx, job_spec) in spec.jobs.into_iter().enumerate() {
        let job = resolve_job(idx as u64, job_spec, &spec.profiles, allow_zero_req_time)?;
        queue.add(job);
    }
    Ok(queue)
}

fn resolve_job(
    auto_id: u64,
    spec: JobSpec,
    profiles: &std::collections::HashMap<String, ProfileSpec>,
    allow_zero_req_time: bool,
) -> Result<Job> {
    let name = spec.id.clone().unwrap_or_else(|| auto_id.to_string());

    let (nodes, ntasks, ntasks_per_node) = match (spec.res, spec.nodes, spec.ntasks, spec.ntasks_per_node) {
        (Some(res), _, _, _) => (1, res, res),
        (None, nodes, ntasks, ntasks_per_node) => {
            let ntasks = ntasks.ok_or_else(|| Error::WorkloadValidation {
                job_id: name.clone(),
                reason: "missing ntasks (or res shorthand)".into(),
            })?;
            let ntasks_per_node = ntasks_per_node.unwrap_or(ntasks);
            let per_node = ntasks_per_node.max(1);
            let nodes = nodes.unwrap_or_else(|| (ntasks + per_node - 1) / per_node);
            (nodes, ntasks, ntasks_per_node)
        }
    };

    let profile: Profile = match &spec.profile {
        Some(profile_name) => profiles
            .get(profile_name)
            .ok_or_else(|| Error::WorkloadValidation {
                job_id: name.clone(),
                reason: format!("unknown profile {:?}", profile_name),
            })?
            .clone()
            .into(),
        None => serde_json::from_value::<ProfileSpec>(spec.inline.clone())
            .map_err(|e| Error::WorkloadValidation {
                job_id: name.clone(),
                reason: format!("job has neither a profile reference nor inline profile fields: {e}"),
            })?
            .into(),
    };

    if !allow_zero_req_time && profile.req_time.0 <= 0.0 {
        return Err(Error::WorkloadValidation {
            job_id: name,
            reason: "req_time must be positive (allow_zero_req_time is disabled)".into(),
        });
    }

    Job::new(
        auto_id,
        name,
        Time(spec.subtime),
        nodes,
        ntasks,
        ntasks_per_node,
        &profile,
        spec.profile,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> tempfile_path::TempFile {
        tempfile_path::TempFile::new(contents)
    }

    mod tempfile_path {
        use std::io::Write;
        use std::path::PathBuf;

        pub struct TempFile {
            pub path: PathBuf,
        }

        impl TempFile {
            pub fn new(contents: &str) -> Self {
                let path = std::env::temp_dir().join(format!("irmasim-workload-test-{}.json", std::process::id()));
                let mut f = std::fs::File::create(&path).unwrap();
                f.write_all(contents.as_bytes()).unwrap();
                Self { path }
            }
        }

        impl Drop for TempFile {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn resolves_res_shorthand_and_inline_profile() {
        let json = r#"{
            "jobs": [
                { "id": "j", "subtime": 2, "res": 1, "req_ops": 1e9, "ipc": 1, "req_time": 10, "mem": 0, "mem_vol": 0 }
            ]
        }"#;
        let f = write_temp(json);
        let queue = load(&f.path, false).unwrap();
        assert_eq!(queue.counts(), (1, 0, 0));
    }

    #[test]
    fn resolves_named_profile_reference() {
        let json = r#"{
            "profiles": { "p": { "req_ops": 2e9, "ipc": 2, "req_time": 5, "mem": 10, "mem_vol": 1 } },
            "jobs": [ { "subtime": 0, "nodes": 1, "ntasks": 2, "ntasks_per_node": 2, "profile": "p" } ]
        }"#;
        let f = write_temp(json);
        let queue = load(&f.path, false).unwrap();
        assert_eq!(queue.counts(), (1, 0, 0));
    }

    #[test]
    fn rejects_zero_req_time_unless_allowed() {
        let json = r#"{
            "jobs": [ { "subtime": 0, "res": 1, "req_ops": 1, "ipc": 1, "req_time": 0, "mem": 0, "mem_vol": 0 } ]
        }"#;
        let f = write_temp(json);
        assert!(load(&f.path, false).is_err());
        assert!(load(&f.path, true).is_ok());
    }
}
