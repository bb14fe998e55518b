//! Fan-out dispatcher.
//!
//! Every descriptor becomes one task on the [`OutboundPool`]. All tasks are
//! submitted before anything is awaited. Each task is self-contained: it
//! starts its own timer, waits for a running slot, calls the provider under
//! the provider's budget and turns every way of ending (value, error, panic,
//! timeout) into a [`ProviderOutcome`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::debug;

use crate::pool::{InFlight, OutboundPool, TaskHandle};
use crate::registry::ProviderDescriptor;
use crate::{ProviderError, ProviderOutcome, SubjectId};

pub(crate) enum PendingTask {
    Running(TaskHandle<ProviderOutcome>),
    /// Never admitted to the pool; already resolved.
    Refused(ProviderOutcome),
}

pub(crate) struct Pending {
    pub(crate) descriptor: ProviderDescriptor,
    pub(crate) task: PendingTask,
}

/// Tasks launched for one aggregate request, in registry order.
///
/// Dropping a `Dispatch` aborts every task that is still running.
pub struct Dispatch {
    pub(crate) pending: Vec<Pending>,
    pub(crate) dispatched_at: Instant,
}

impl Dispatch {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub const fn dispatched_at(&self) -> Instant {
        self.dispatched_at
    }

    pub fn abort(&self) {
        for pending in &self.pending {
            if let PendingTask::Running(handle) = &pending.task {
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers: Vec<_> = self
            .pending
            .iter()
            .map(|pending| pending.descriptor.name())
            .collect();
        f.debug_struct("Dispatch")
            .field("providers", &providers)
            .finish_non_exhaustive()
    }
}

/// Launches provider tasks on the shared outbound pool.
#[derive(Debug, Clone)]
pub struct FanOutDispatcher {
    pool: Arc<OutboundPool>,
}

impl FanOutDispatcher {
    pub fn new(pool: Arc<OutboundPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<OutboundPool> {
        &self.pool
    }

    pub fn dispatch(&self, descriptors: Vec<ProviderDescriptor>, subject: &SubjectId) -> Dispatch {
        let dispatched_at = Instant::now();
        let pending = descriptors
            .into_iter()
            .map(|descriptor| {
                let task_descriptor = descriptor.clone();
                let task_subject = subject.clone();
                let task = match self
                    .pool
                    .submit(move |gate| run_provider(task_descriptor, task_subject, gate))
                {
                    Ok(handle) => PendingTask::Running(handle),
                    Err(saturated) => PendingTask::Refused(ProviderOutcome::Failure {
                        error: ProviderError::unavailable(format!(
                            "{} not dispatched: {saturated}",
                            descriptor.name()
                        )),
                        elapsed: Duration::ZERO,
                    }),
                };
                debug!(
                    provider = %descriptor.name(),
                    subject = %subject,
                    admitted = matches!(task, PendingTask::Running(_)),
                    "provider dispatched"
                );
                Pending { descriptor, task }
            })
            .collect();

        Dispatch {
            pending,
            dispatched_at,
        }
    }
}

async fn run_provider(
    descriptor: ProviderDescriptor,
    subject: SubjectId,
    gate: InFlight,
) -> ProviderOutcome {
    let started = Instant::now();
    let name = descriptor.name();
    let budget = descriptor.budget();

    let call = async {
        let Some(_permit) = gate.enter().await else {
            return Err(ProviderError::unavailable(format!(
                "{name} not run: outbound pool is shutting down"
            )));
        };

        let invoked = AssertUnwindSafe(async { descriptor.invoke(subject).await })
            .catch_unwind()
            .await;
        match invoked {
            Ok(Ok(value)) if value.provider() != name => Err(ProviderError::internal(format!(
                "{name} produced a {} value",
                value.provider()
            ))),
            Ok(result) => result,
            Err(payload) => Err(ProviderError::internal(format!(
                "{name} panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    };

    match tokio::time::timeout(budget, call).await {
        Ok(Ok(value)) => ProviderOutcome::Success {
            value,
            elapsed: started.elapsed(),
        },
        Ok(Err(error)) => ProviderOutcome::Failure {
            error,
            elapsed: started.elapsed(),
        },
        Err(_) => ProviderOutcome::Failure {
            error: ProviderError::timeout(budget),
            elapsed: budget,
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use tokio::runtime::Handle;

    use super::*;
    use crate::pool::PoolSettings;
    use crate::registry::{Budget, InvokeFuture};
    use crate::{ProviderErrorKind, ProviderId, ProviderValue};

    fn pool() -> Arc<OutboundPool> {
        Arc::new(
            OutboundPool::on_handle(Handle::current(), PoolSettings::default())
                .expect("pool"),
        )
    }

    fn descriptor(
        name: ProviderId,
        budget_ms: u64,
        invoke: impl Fn(SubjectId, Duration) -> InvokeFuture + Send + Sync + 'static,
    ) -> ProviderDescriptor {
        ProviderDescriptor::new(
            name,
            ProviderValue::default_for(name),
            Budget::from_millis(budget_ms).expect("non-zero budget"),
            invoke,
        )
    }

    async fn outcome_of(dispatch: Dispatch) -> ProviderOutcome {
        match dispatch.pending.into_iter().next().map(|pending| pending.task) {
            Some(PendingTask::Running(handle)) => handle.await.expect("task joins"),
            Some(PendingTask::Refused(outcome)) => outcome,
            None => panic!("nothing dispatched"),
        }
    }

    #[tokio::test]
    async fn panicking_provider_becomes_internal_failure() {
        let dispatcher = FanOutDispatcher::new(pool());
        let exploding = descriptor(ProviderId::Profiles, 500, |subject, _| {
            Box::pin(async move {
                if subject.as_str().starts_with("acct") {
                    panic!("profile store exploded");
                }
                Ok(ProviderValue::Profiles(Vec::new()))
            })
        });

        let dispatch = dispatcher.dispatch(vec![exploding], &SubjectId::from("acct-1"));
        let outcome = outcome_of(dispatch).await;

        match outcome {
            ProviderOutcome::Failure { error, .. } => {
                assert_eq!(error.kind(), ProviderErrorKind::Internal);
                assert!(error.message().contains("profile store exploded"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hanging_provider_times_out_at_its_budget() {
        let dispatcher = FanOutDispatcher::new(pool());
        let hanging = descriptor(ProviderId::Catalog, 40, |_, _| {
            Box::pin(std::future::pending::<Result<ProviderValue, ProviderError>>())
        });

        let dispatch = dispatcher.dispatch(vec![hanging], &SubjectId::from("acct-1"));
        let outcome = outcome_of(dispatch).await;

        match outcome {
            ProviderOutcome::Failure { error, elapsed } => {
                assert_eq!(error.kind(), ProviderErrorKind::Timeout);
                assert_eq!(elapsed, Duration::from_millis(40));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_value_variant_is_rejected() {
        let dispatcher = FanOutDispatcher::new(pool());
        let confused = descriptor(ProviderId::Billing, 500, |_, _| {
            Box::pin(async { Ok(ProviderValue::Catalog(Vec::new())) })
        });

        let dispatch = dispatcher.dispatch(vec![confused], &SubjectId::from("acct-1"));
        let outcome = outcome_of(dispatch).await;

        match outcome {
            ProviderOutcome::Failure { error, .. } => {
                assert_eq!(error.kind(), ProviderErrorKind::Internal);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let text: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(text.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
