use std::sync::Arc;

use switchyard_core::Aggregator;
use tracing::info;

use crate::cli::ServeArgs;
use crate::error::CliError;
use crate::server;

pub async fn run(args: &ServeArgs, aggregator: Arc<Aggregator>) -> Result<(), CliError> {
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(
        addr = %listener.local_addr()?,
        outbound_workers = aggregator.pool().settings().worker_threads,
        "dashboard server listening"
    );

    axum::serve(listener, server::router(aggregator))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("dashboard server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
