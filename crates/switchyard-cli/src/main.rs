mod cli;
mod commands;
mod error;
mod output;
mod server;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::error::CliError;

const INBOUND_THREAD_NAME: &str = "switchyard-inbound";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SWITCHYARD_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Inbound work runs on its own runtime; provider calls run on the outbound
/// pool built by the aggregator.
fn run(cli: Cli) -> Result<(), CliError> {
    if cli.inbound_workers == 0 {
        return Err(CliError::Usage(String::from(
            "--inbound-workers must be greater than zero",
        )));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cli.inbound_workers)
        .thread_name(INBOUND_THREAD_NAME)
        .enable_all()
        .build()?;

    runtime.block_on(commands::run(&cli))
}
