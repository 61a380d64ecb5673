mod cli;
mod config;
mod paths;
mod report;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use std::io::{self, Write};
use volcap::VolumeCapacityProbe;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let config = config::Config::load()?;
    let probe = VolumeCapacityProbe::new().with_untiered_policy(config.untiered);
    log::info!(
        "Backend: {}, untiered policy: {}",
        probe.backend_name(),
        probe.untiered_policy()
    );

    let targets = cli.targets();
    let mut stdout = io::stdout().lock();
    let summary = report::show_all(&probe, &targets, &mut stdout)?;
    stdout.flush()?;

    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} paths could not be queried",
            summary.failed(),
            summary.total()
        );
    }

    Ok(())
}
