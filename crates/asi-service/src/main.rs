//! `asid` entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use asi_service::config::ServiceConfig;
use asi_service::logging::RoleLogWriter;
use asi_service::{run_parent, run_worker};
use asi_state::StorageLayout;

/// Automotive Safety Interlock daemon.
#[derive(Debug, Parser)]
#[command(name = "asid", version, about)]
struct Args {
    /// Configuration file (created with defaults if missing).
    #[arg(long, default_value = "asi_service.json")]
    config: PathBuf,

    /// Override the data directory from the configuration file.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Load state from the storage files instead of zero-initialising.
    #[arg(long)]
    soft_restart: bool,

    /// Run the worker in this process, without the parent supervisor.
    #[arg(long)]
    no_fork: bool,

    /// Log to stderr instead of the per-process log files.
    #[arg(long)]
    stderr: bool,
}

fn init_logging(args: &Args, layout: &StorageLayout) -> Result<()> {
    if args.stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    let writer = RoleLogWriter::open(&layout.parent_log(), &layout.child_log())?;
    tracing_subscriber::fmt().with_ansi(false).with_writer(writer).init();
    Ok(())
}

fn run() -> Result<i32> {
    let args = Args::parse();

    let mut config =
        ServiceConfig::load_or_create(&args.config).context("configuration unavailable")?;
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }

    let layout = StorageLayout::new(&config.data_dir);
    layout.ensure().context("storage area unavailable")?;
    init_logging(&args, &layout)?;

    if args.no_fork {
        asi_service::signals::install_child_handlers();
        run_worker(&config, args.soft_restart)
    } else {
        run_parent(&config, args.soft_restart)
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            error!(%err, "asid failed");
            eprintln!("asid: {err:#}");
            ExitCode::FAILURE
        }
    }
}
