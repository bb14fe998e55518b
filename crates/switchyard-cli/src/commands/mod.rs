mod dashboard;
mod providers;
mod serve;

use std::sync::Arc;

use switchyard_core::{Aggregator, AggregatorConfig};
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let aggregator = Arc::new(build_aggregator(cli)?);

    match &cli.command {
        Command::Serve(args) => serve::run(args, aggregator).await,
        Command::Dashboard(args) => {
            let dashboard = dashboard::run(args, &aggregator).await?;
            output::render(&dashboard, cli.pretty)
        }
        Command::Providers(args) => {
            let listing = providers::run(args, &aggregator)?;
            output::render(&listing, cli.pretty)
        }
    }
}

fn build_aggregator(cli: &Cli) -> Result<Aggregator, CliError> {
    let mut config = AggregatorConfig::load(cli.config.as_deref())?;
    if cli.mock {
        config = config.with_mock_transport();
    }
    debug!(transport = %config.transport, mock = cli.mock, "configuration loaded");

    Ok(config.build()?)
}
