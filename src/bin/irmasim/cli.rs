//! Argument parsing, grounded on the teacher's `bin/infersim/cli.rs`
//! split between `cli_config`/`cli_match`, rebuilt on `structopt`'s
//! derive macro (the crate the teacher actually lists as a dependency)
//! instead of hand-built `clap::App`.

use std::path::PathBuf;

use structopt::StructOpt;

use irmasim::config::AppConfig;
use irmasim::error::Result;

use crate::commands;

#[derive(Debug, StructOpt)]
#[structopt(name = "irmasim", about = "Discrete-event simulator for HPC job scheduling policies")]
pub struct Opt {
    /// Custom config file, merged on top of the built-in defaults.
    #[structopt(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Subcommand,
}

#[derive(Debug, StructOpt)]
enum Subcommand {
    /// Run every configured trajectory to completion.
    Run {
        /// Platform topology JSON (overrides `platform_file` from config).
        #[structopt(long, value_name = "FILE")]
        platform: Option<PathBuf>,
        /// Workload JSON (overrides `workload_file` from config).
        #[structopt(long, value_name = "FILE")]
        workload: Option<PathBuf>,
        /// Directory the three CSV logs and statistics.json are written to.
        #[structopt(long = "output-dir", value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Print the effective configuration and exit.
    Config,
}

/// Parses `std::env::args`, merges any `--config` file, and dispatches.
pub fn execute() -> Result<()> {
    let opt = Opt::from_args();

    AppConfig::merge_config(opt.config.as_deref().and_then(|p| p.to_str()))?;

    match opt.command {
        Subcommand::Run { platform, workload, output_dir } => {
            if let Some(p) = platform.as_deref().and_then(|p| p.to_str()) {
                AppConfig::set("platform_file", p)?;
            }
            if let Some(w) = workload.as_deref().and_then(|p| p.to_str()) {
                AppConfig::set("workload_file", w)?;
            }
            if let Some(o) = output_dir.as_deref().and_then(|p| p.to_str()) {
                AppConfig::set("output_dir", o)?;
            }
            commands::run()
        }
        Subcommand::Config => commands::config(),
    }
}
