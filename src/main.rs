use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod config;
mod error;
mod remote;
mod run_id;
mod status;
mod store;
mod sync;

#[derive(Parser)]
#[command(
    name = "runsync",
    version,
    about = "Mirror model-run directories from the remote file server and report job status"
)]
struct Cli {
    /// Path to config file [default: ~/.config/runsync/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one synchronisation pass (intended to be driven from cron)
    Sync,
    /// Resolve and print the status of one model run
    Status {
        /// Numeric run identifier
        #[arg(long)]
        run_id: u64,
    },
}

fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "runsync=info",
        1 => "runsync=debug",
        2 => "runsync=trace",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Exit code contract: 0 success, 1 user-printable error, 2 anything
    // unexpected. Nothing escapes this boundary unclassified.
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = error::exit_code(&e);
            if code == 1 {
                tracing::error!("{e:#}");
            } else {
                tracing::error!(error = ?e, "unexpected failure");
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let cfg = config::load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Sync => {
            let totals = sync::Synchroniser::new(cfg)?.run()?;
            println!(
                "sync complete: {} created, {} updated, {} deleted",
                totals.created, totals.updated, totals.deleted
            );
        }
        Command::Status { run_id } => {
            let snapshot = status::queue_snapshot(&cfg.scheduler)?;
            let resolver = status::JobStatusResolver::new(&cfg.local);
            let job = resolver.resolve(run_id::RunId::new(*run_id), &snapshot);

            println!("Run {}: {}", job.run_id, job.status);
            if let Some(message) = &job.error_message {
                println!("Error: {message}");
            }
            if let Some(t) = job.start_time {
                println!("Started: {t}");
            }
            if let Some(t) = job.end_time {
                println!("Finished: {t}");
            }
            if job.storage_mb > 0 {
                println!("Storage: {} MB", job.storage_mb);
            }
        }
    }
    Ok(())
}
