//! Request-level orchestration.
//!
//! `resolve subject -> build descriptors -> dispatch -> join -> assemble`.
//! Only an unknown subject, or caller cancellation, fails a request.

use std::future::Future;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::assembler::{assemble_dashboard, DashboardResponse};
use crate::dispatcher::FanOutDispatcher;
use crate::joiner::{duration_ms, join};
use crate::metrics::ProviderMetrics;
use crate::pool::OutboundPool;
use crate::registry::{ProviderRegistry, UseCase};
use crate::{AggregateError, SubjectId, SubjectResolver};

/// Shared entry point for aggregate requests. Cheap to share behind an `Arc`;
/// every request builds its own descriptors and report.
pub struct Aggregator {
    resolver: Arc<dyn SubjectResolver>,
    registry: ProviderRegistry,
    dispatcher: FanOutDispatcher,
    metrics: Arc<ProviderMetrics>,
}

impl Aggregator {
    pub fn new(
        resolver: Arc<dyn SubjectResolver>,
        registry: ProviderRegistry,
        pool: Arc<OutboundPool>,
    ) -> Self {
        Self {
            resolver,
            registry,
            dispatcher: FanOutDispatcher::new(pool),
            metrics: Arc::new(ProviderMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ProviderMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<ProviderMetrics> {
        &self.metrics
    }

    pub fn pool(&self) -> &Arc<OutboundPool> {
        self.dispatcher.pool()
    }

    pub async fn dashboard(
        &self,
        subject: &SubjectId,
    ) -> Result<DashboardResponse, AggregateError> {
        self.dashboard_until(subject, std::future::pending::<()>())
            .await
    }

    /// Like [`Aggregator::dashboard`], but gives up with
    /// [`AggregateError::Cancelled`] as soon as `cancel` completes. Outstanding
    /// provider tasks are aborted.
    pub async fn dashboard_until<C>(
        &self,
        subject: &SubjectId,
        cancel: C,
    ) -> Result<DashboardResponse, AggregateError>
    where
        C: Future<Output = ()>,
    {
        let Some(identity) = self.resolver.resolve(subject) else {
            self.metrics.record_subject_not_found();
            warn!(subject = %subject, "subject not found; nothing dispatched");
            return Err(AggregateError::SubjectNotFound(subject.clone()));
        };

        info!(subject = %subject, "dashboard requested");
        let started = Instant::now();
        let descriptors = self.registry.descriptors(UseCase::Dashboard);
        let dispatch = self.dispatcher.dispatch(descriptors, subject);
        let providers = dispatch.len();

        let joined = tokio::select! {
            joined = join(dispatch) => joined,
            () = cancel => {
                warn!(subject = %subject, "aggregate request cancelled before join");
                return Err(AggregateError::Cancelled);
            }
        };

        let response = assemble_dashboard(identity, joined, started, OffsetDateTime::now_utc());
        self.metrics.record(&response.latency);

        let degraded = response.latency.failed().count();
        info!(
            subject = %subject,
            providers,
            degraded,
            total_elapsed_ms = duration_ms(response.latency.total_elapsed),
            "dashboard assembled"
        );

        Ok(response)
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("registry", &self.registry)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
