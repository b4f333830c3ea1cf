#![deny(unsafe_code)]

mod constants;
mod control;
mod daemon;
mod input;
mod triggers;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::daemon::DaemonOptions;

#[derive(Parser, Debug)]
#[command(name = "keytrigd")]
#[command(version)]
#[command(about = "Input event trigger daemon", long_about = None)]
struct Cli {
    /// Dump events to console
    #[arg(short, long)]
    dump: bool,

    /// Load trigger definitions from <FILE> (may be repeated)
    #[arg(short, long, value_name = "FILE")]
    triggers: Vec<PathBuf>,

    /// Read ADD/REMOVE commands from <FIFO>
    #[arg(short, long, value_name = "FIFO")]
    command: Option<PathBuf>,

    /// Input device files to watch (e.g. /dev/input/event0)
    devices: Vec<PathBuf>,
}

impl From<Cli> for DaemonOptions {
    fn from(cli: Cli) -> Self {
        Self {
            devices: cli.devices,
            command_path: cli.command,
            trigger_files: cli.triggers,
            dump: cli.dump,
        }
    }
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // usage errors exit with 1, help and version with 0
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Logs go to stderr; stdout is reserved for the event dump
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    daemon::run_daemon(cli.into())
}
