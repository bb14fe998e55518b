//! CLI argument definitions for switchyard.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve` | Run the dashboard HTTP server |
//! | `dashboard` | Aggregate one subject and print the dashboard |
//! | `providers` | List the providers a use case fans out to |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | JSON configuration file |
//! | `--mock` | `false` | Use the in-process scripted transport |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--inbound-workers` | `4` | Threads serving inbound requests |
//!
//! # Examples
//!
//! ```bash
//! # Serve the dashboard endpoint against mock upstreams
//! switchyard serve --mock --bind 127.0.0.1:9000
//!
//! # One-shot aggregate, giving up after 500ms
//! switchyard dashboard acct-42 --mock --deadline-ms 500 --pretty
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Fan-out aggregation of the user analytics dashboard.
#[derive(Debug, Parser)]
#[command(
    name = "switchyard",
    author,
    version,
    about = "Fan-out aggregation of the user analytics dashboard"
)]
pub struct Cli {
    /// JSON configuration file. Environment overrides apply on top.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Route every provider through the in-process scripted transport.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Worker threads of the inbound runtime.
    #[arg(long, global = true, default_value_t = 4)]
    pub inbound_workers: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve `GET /api/users/analytics/dashboard/{userId}`.
    Serve(ServeArgs),
    /// Aggregate one subject and print the dashboard as JSON.
    Dashboard(DashboardArgs),
    /// Print the registered providers with their transport and budget.
    Providers(ProvidersArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0:9000")]
    pub bind: SocketAddr,
}

#[derive(Debug, Args)]
pub struct DashboardArgs {
    /// Subject (user) id to aggregate.
    pub subject: String,

    /// Cancel the request if it has not completed within this many
    /// milliseconds.
    #[arg(long)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ProvidersArgs {
    #[arg(long, default_value = "dashboard")]
    pub use_case: String,

    /// Include process-wide call statistics.
    #[arg(long, default_value_t = false)]
    pub stats: bool,
}
