//! Subcommand bodies, grounded on the teacher's `bin/infersim/commands.rs`
//! (one small function per subcommand, delegating straight into the
//! library crate).

use irmasim::config::AppConfig;
use irmasim::error::{ErrorKind, Kind as _, Result};

/// Runs every configured trajectory; spec.md §6's exit-code contract is
/// enforced by `main` translating the `Result` this returns.
pub fn run() -> Result<()> {
    irmasim::run()
}

/// Prints the effective configuration as YAML and exits, mirroring the
/// teacher's `config` subcommand (there printed with `{:#?}`; here with
/// `serde_yaml` since the crate already carries that dependency for
/// dumping typed settings in a readable form).
pub fn config() -> Result<()> {
    let config = AppConfig::fetch()?;
    let yaml = serde_yaml::to_string(&config).kind(ErrorKind::Config)?;
    println!("{}", yaml);
    Ok(())
}
