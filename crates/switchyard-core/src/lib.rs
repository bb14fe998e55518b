//! # Switchyard Core
//!
//! Fan-out aggregation for the user analytics dashboard.
//!
//! ## Overview
//!
//! One aggregate request resolves a subject locally, fans out to every
//! registered upstream provider in parallel and joins the results into a
//! single [`DashboardResponse`]:
//!
//! - **Transport adapters** hide REST, GraphQL and gRPC behind one trait
//! - **Provider registry** describes each call with its default and budget
//! - **Fan-out dispatcher** runs calls on a dedicated outbound pool
//! - **Result joiner** waits for all calls and substitutes defaults
//! - **Assembler** builds the composite response and latency report
//!
//! A failing, slow or panicking provider degrades its own section only.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`aggregator`] | Request-level orchestration |
//! | [`assembler`] | Composite dashboard construction |
//! | [`config`] | File and environment configuration |
//! | [`dispatcher`] | Parallel dispatch onto the outbound pool |
//! | [`domain`] | Subjects and provider records |
//! | [`error`] | Core error types |
//! | [`joiner`] | Barrier join and latency report |
//! | [`metrics`] | Process-wide provider statistics |
//! | [`pool`] | Bounded outbound execution pool |
//! | [`provider`] | Provider identifiers, values and outcomes |
//! | [`registry`] | Provider descriptors per use case |
//! | [`transport`] | Transport adapters |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard_core::{AggregatorConfig, SubjectId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let aggregator = AggregatorConfig::default().with_mock_transport().build()?;
//!
//!     let dashboard = aggregator.dashboard(&SubjectId::from("acct-42")).await?;
//!     println!("{} profiles", dashboard.profiles.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  HTTP / CLI     │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Aggregator     │────▶│ Subject Resolver │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Dispatcher      │────▶│ Outbound Pool    │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       ▼
//!          │              ┌──────────────────┐
//!          │              │ Upstream Source  │
//!          │              │ (REST/GQL/gRPC)  │
//!          ▼              └──────────────────┘
//! ┌─────────────────┐
//! │ Joiner          │
//! │ + Assembler     │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Provider failures never fail a request. They surface in the latency
//! report with a stable code:
//!
//! ```rust
//! use switchyard_core::{ProviderError, ProviderErrorKind};
//!
//! fn describe(error: &ProviderError) -> &'static str {
//!     match error.kind() {
//!         ProviderErrorKind::Timeout => "slow upstream",
//!         ProviderErrorKind::Unavailable => "upstream down",
//!         _ => "degraded",
//!     }
//! }
//! ```
//!
//! Only [`AggregateError`] ends a request early.

pub mod aggregator;
pub mod assembler;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod joiner;
pub mod metrics;
pub mod pool;
pub mod provider;
pub mod registry;
pub mod transport;

// Orchestration
pub use aggregator::Aggregator;
pub use assembler::{assemble_dashboard, DashboardResponse};
pub use dispatcher::{Dispatch, FanOutDispatcher};
pub use joiner::{join, JoinedResults, LatencyEntry, LatencyReport, LatencyStatus};

// Configuration
pub use config::{AggregatorConfig, ProviderConfig, ProvidersConfig};

// Domain models
pub use domain::{
    ContentSummary, PaymentRecord, PlanSummary, ProfileSummary, SubjectDirectory, SubjectId,
    SubjectIdentity, SubjectResolver, SubscriptionSummary, WatchHistory,
};

// Error types
pub use error::{AggregateError, ConfigError, ValidationError};

// Metrics
pub use metrics::{MetricsSnapshot, ProviderMetrics, ProviderStats};

// Outbound pool
pub use pool::{OutboundPool, PoolSaturated, PoolSettings, TaskHandle};

// Provider values
pub use provider::{ProviderError, ProviderErrorKind, ProviderId, ProviderOutcome, ProviderValue};

// Registry
pub use registry::{
    Budget, ProviderDescriptor, ProviderPolicy, ProviderRegistry, ProviderSnapshot, Upstreams,
    UseCase,
};

// Transports
pub use transport::{
    GraphQlSource, GrpcSource, HttpClient, ProviderEndpoints, ReqwestHttpClient, RestSource,
    Script, ScriptedSource, TransportKind, UpstreamSource,
};
