//! Binary entry point, grounded on the teacher's `bin/infersim/main.rs`:
//! install a panic handler, set up logging, load configuration, then
//! dispatch to the parsed subcommand.

use irmasim::config::AppConfig;
use irmasim::error::Result;
use irmasim::logging;

mod cli;
mod commands;

fn main() -> Result<()> {
    // Panic setup should happen before anything else can panic.
    color_backtrace::install();

    // Held for the process lifetime so the non-blocking writer keeps flushing.
    let _guard = logging::setup()?;

    AppConfig::init(None)?;

    cli::execute()
}
