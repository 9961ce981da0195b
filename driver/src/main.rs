mod command;
mod config;
mod hosts;
mod partition;
mod rundir;
mod supervisor;

#[cfg(test)]
mod partition_test;
#[cfg(test)]
mod testutil;

use crate::{
    config::RunConfig,
    rundir::RunDir,
    supervisor::{Supervisor, WaitOutcome},
};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "distributes a writer fleet over a host pool and supervises it")]
struct Cli {
    /// yaml run configuration
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// partition the workload, launch the writer fleet and wait for it
    Run {
        /// subdirectory of output.root this run works in
        #[arg(short, long)]
        run_id: String,
        /// overwrite an existing run directory
        #[arg(long)]
        force: bool,
        /// run a single writer without log redirection, for local testing
        #[arg(long)]
        foreground: bool,
    },
    /// kill every recorded process of an existing run
    Kill {
        /// subdirectory of output.root holding the run
        #[arg(short, long)]
        run_id: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match RunConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load {}: {e}", cli.config.display());
            exit(1);
        }
    };

    match cli.command {
        Commands::Run {
            run_id,
            force,
            foreground,
        } => run(config, &run_id, force, foreground),
        Commands::Kill { run_id } => kill(config, &run_id),
    }
}

/// the full driver pipeline: prepare the run directory, partition the
/// workload, build and launch the writer commands, wait for the fleet
fn run(config: RunConfig, run_id: &str, force: bool, foreground: bool) {
    if config.preflight_checks() {
        error!("aborting, no job was launched");
        exit(1);
    }

    if foreground && config.writers.count != 1 {
        error!(
            "--foreground needs writers.count == 1, configured {}",
            config.writers.count
        );
        exit(1);
    }

    let rundir = match RunDir::prepare(&config.output.root, run_id, force) {
        Ok(rundir) => rundir,
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };
    if let Err(e) = rundir.snapshot_config(&config) {
        error!("{e}");
        exit(1);
    }

    let assignments = match partition::divide_between_writers(
        config.writers.count,
        &config.writers.classes,
    ) {
        Ok(assignments) => assignments,
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };
    if let Err(e) = rundir.snapshot_assignments(&assignments) {
        error!("{e}");
        exit(1);
    }

    let writer_hosts = match hosts::assign_hosts(&config.writers) {
        Ok(writer_hosts) => writer_hosts,
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };

    let commands = command::build_writer_commands(&config, &rundir, &assignments, foreground);

    let mut jobs = Supervisor::new(
        rundir,
        config.supervisor.poll_interval(),
        config.supervisor.max_run(),
    );

    if let Err(e) = jobs.launch(command::WRITER_GROUP, &commands, &writer_hosts) {
        error!("{e}");
        error!(
            launched = jobs.launched().len(),
            "launch aborted, already started jobs keep running"
        );
        exit(1);
    }

    match jobs.wait() {
        WaitOutcome::AllFinished => info!("run complete"),
        WaitOutcome::TimedOut { unfinished } => {
            warn!(unfinished, "run hit the wall clock limit");
            exit(1);
        }
    }
}

/// standalone kill sweep over an existing run's pid directory
fn kill(config: RunConfig, run_id: &str) {
    let rundir = match RunDir::open(&config.output.root, run_id) {
        Ok(rundir) => rundir,
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };

    let mut jobs = Supervisor::new(
        rundir,
        config.supervisor.poll_interval(),
        config.supervisor.max_run(),
    );
    let killed = jobs.kill_all(None);
    info!(killed, "kill sweep complete");
}
