//! mirror-sync CLI
//!
//! Runs one synchronization cycle for the given configuration. Meant to be
//! invoked by cron, a systemd timer or by hand.

mod cli;
mod error;
mod logging;

use std::fs;

use clap::Parser;
use colored::Colorize;
use mirror_core::{CycleOutcome, CycleReport, SyncConfig, Synchronizer, lock_path};
use mirror_fs::FileLock;

use cli::Cli;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose)
        .map_err(|e| CliError::user(format!("failed to initialise logging: {e}")))?;
    tracing::debug!(config = %cli.config.display(), "Loading configuration");

    let config = SyncConfig::load(&cli.config)?;
    config.validate()?;

    let install_root = config.install_root()?;
    fs::create_dir_all(&install_root)?;
    let lock = lock_path(&install_root);
    let _guard = FileLock::try_acquire(&lock).map_err(|e| match e {
        mirror_fs::Error::LockFailed { .. } => CliError::user(format!(
            "another mirror-sync cycle is running (lock held on {})",
            lock.display()
        )),
        other => other.into(),
    })?;

    let mut synchronizer = Synchronizer::from_config(&config)?.with_verbose(cli.verbose);
    let report = synchronizer.run_cycle()?;
    print_summary(&report);

    Ok(())
}

fn print_summary(report: &CycleReport) {
    match &report.outcome {
        CycleOutcome::Committed { commit, categories } => {
            let short = commit.get(..8).unwrap_or(commit);
            println!(
                "{} {} [{}]",
                "committed".green().bold(),
                short.yellow(),
                categories
            );
        }
        CycleOutcome::NoOp => println!("{}", "up to date".green()),
    }

    println!("  {} source(s) mirrored", report.mirrored.len());
    for skipped in &report.skipped {
        println!(
            "  {} {} ({})",
            "skipped".yellow(),
            skipped.entry.source.display(),
            skipped.reason
        );
    }
    for removed in &report.removed {
        println!(
            "  {} {}",
            "removed".red(),
            removed.source.display()
        );
    }
}
