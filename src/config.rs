//! Process-wide typed settings, following the teacher's
//! `utils::app_config::AppConfig`: a `config::Config` behind a
//! `lazy_static` `RwLock`, with a typed snapshot fetched on demand.
//! Grounded also in the original `irmasim.Options` singleton
//! (spec.md §9 "Global state").

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::RwLock;

use config::{Config, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Kind as _, Result};

lazy_static! {
    static ref RAW: RwLock<Config> = RwLock::new(default_config());
}

fn default_config() -> Config {
    let mut c = Config::new();
    c.set_default("seed", 0i64).ok();
    c.set_default("output_dir", ".").ok();
    c.set_default("nbtrajectories", 1i64).ok();
    c.set_default("trajectory_origin", "0").ok();
    c.set_default("trajectory_length", "0").ok();
    c.set_default("platform_library_path", "data").ok();
    c.set_default("workload_manager.type", "Basic").ok();
    c.set_default("allow_zero_req_time", false).ok();
    c
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkloadManagerConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub resource_selection: Option<String>,
    pub job_selection: Option<String>,
    pub criterion: Option<String>,
    pub job_prio: Option<String>,
    pub node_prio: Option<String>,
}

/// Typed snapshot of the process configuration, fetched from [`AppConfig`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimConfig {
    pub seed: u64,
    pub output_dir: PathBuf,
    pub nbtrajectories: u32,
    /// integer, "random" or "0" (all remaining)
    pub trajectory_origin: String,
    /// integer, "random" or "0" (all remaining)
    pub trajectory_length: String,
    pub platform_file: Option<PathBuf>,
    pub platform_library_path: PathBuf,
    pub workload_file: PathBuf,
    pub workload_manager: WorkloadManagerConfig,
    pub log_resource_type: Option<String>,
    /// whether a job with req_time == 0 is admitted (spec.md §9 open question)
    pub allow_zero_req_time: bool,
}

pub struct AppConfig;

impl AppConfig {
    /// Initializes the global config from an optional default file contents
    /// (embedded at compile time by the binary) plus environment overrides.
    pub fn init(default_config: Option<&str>) -> Result<()> {
        let mut settings = self::default_config();
        if let Some(contents) = default_config {
            settings
                .merge(File::from_str(contents, FileFormat::Toml))
                .kind(ErrorKind::Config)?;
        }
        settings
            .merge(Environment::with_prefix("IRMASIM").separator("__"))
            .kind(ErrorKind::Config)?;
        *RAW.write().unwrap() = settings;
        Ok(())
    }

    /// Merges a user-supplied config file (`--config path`) on top of
    /// whatever was loaded by `init`.
    pub fn merge_config(config_file: Option<&str>) -> Result<()> {
        if let Some(path) = config_file {
            RAW.write()
                .unwrap()
                .merge(File::with_name(path))
                .kind(ErrorKind::Config)?;
        }
        Ok(())
    }

    pub fn set(key: &str, value: &str) -> Result<()> {
        RAW.write().unwrap().set(key, value).kind(ErrorKind::Config)?;
        Ok(())
    }

    pub fn get<'de, T: Deserialize<'de>>(key: &'de str) -> Result<T> {
        RAW.read().unwrap().get::<T>(key).kind(ErrorKind::Config)
    }

    /// Clones the whole config into a typed [`SimConfig`] snapshot.
    pub fn fetch() -> Result<SimConfig> {
        let r = RAW.read().unwrap();
        let cloned = r.deref().clone();
        cloned.try_into().kind(ErrorKind::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TEST_CONFIG: &str = r#"
output_dir = "out"
nbtrajectories = 2
trajectory_origin = "0"
trajectory_length = "0"
platform_library_path = "data"
workload_file = "workload.json"

[workload_manager]
type = "Backfill"
resource_selection = "high_cores"
"#;

    #[test]
    fn fetch_config_roundtrips_fields() {
        AppConfig::init(Some(TEST_CONFIG)).unwrap();
        let cfg = AppConfig::fetch().unwrap();
        assert_eq!(cfg.nbtrajectories, 2);
        assert_eq!(cfg.workload_manager.kind, "Backfill");
        assert_eq!(cfg.workload_manager.resource_selection.as_deref(), Some("high_cores"));
    }

    #[test]
    fn verify_set_overrides_a_single_key() {
        AppConfig::init(Some(TEST_CONFIG)).unwrap();
        AppConfig::set("seed", "42").unwrap();
        assert_eq!(AppConfig::get::<u64>("seed").unwrap(), 42);
    }
}
