//! relay-purge binary.
//!
//! Resolves the configuration, installs logging and signal handling, then purges the relay logs
//! of the target MySQL replica. Exits with a non-zero code on any failure.

use std::process::ExitCode;

use clap::Parser;
use relay_purge_config::load_purge_config;
use relay_purge_telemetry::tracing::init_tracing;
use tracing::error;

use crate::args::{AppArgs, version_string};
use crate::core::start_purge_with_config;

mod args;
mod core;

fn main() -> ExitCode {
    let args = AppArgs::parse();

    if args.version {
        println!("{}", version_string());
        return ExitCode::SUCCESS;
    }

    let _log_flusher = match init_tracing(env!("CARGO_BIN_NAME")) {
        Ok(log_flusher) => log_flusher,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = run(&args) {
        error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &AppArgs) -> anyhow::Result<()> {
    let config = load_purge_config(&args.overrides())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_purge_with_config(config))
}
