//! Result joiner: the barrier after fan-out.
//!
//! Waits for every dispatched task, never returning early, then substitutes
//! each failed provider's default and records one latency entry per
//! provider. Entries are keyed by provider name, so the report does not
//! depend on completion order.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::dispatcher::{Dispatch, Pending, PendingTask};
use crate::registry::ProviderDescriptor;
use crate::{ProviderError, ProviderErrorKind, ProviderId, ProviderOutcome, ProviderValue};

/// Whether a provider contributed its real value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyStatus {
    Ok,
    Failed,
}

/// Timing and outcome of one provider within one aggregate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyEntry {
    pub elapsed_ms: u64,
    pub status: LatencyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
    #[serde(skip)]
    pub error_kind: Option<ProviderErrorKind>,
}

impl LatencyEntry {
    pub fn from_outcome(outcome: &ProviderOutcome) -> Self {
        let elapsed = outcome.elapsed();
        let error = match outcome {
            ProviderOutcome::Success { .. } => None,
            ProviderOutcome::Failure { error, .. } => Some(error),
        };

        Self {
            elapsed_ms: duration_ms(elapsed),
            status: if error.is_some() {
                LatencyStatus::Failed
            } else {
                LatencyStatus::Ok
            },
            error_code: error.map(ProviderError::code),
            message: error.map(|error| error.message().to_owned()),
            elapsed,
            error_kind: error.map(ProviderError::kind),
        }
    }

    pub const fn is_ok(&self) -> bool {
        matches!(self.status, LatencyStatus::Ok)
    }
}

/// Per-provider latency plus the total for one aggregate request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyReport {
    pub providers: BTreeMap<ProviderId, LatencyEntry>,
    pub total_elapsed_ms: u64,
    #[serde(skip)]
    pub total_elapsed: Duration,
}

impl LatencyReport {
    pub fn entry(&self, provider: ProviderId) -> Option<&LatencyEntry> {
        self.providers.get(&provider)
    }

    pub fn max_elapsed(&self) -> Duration {
        self.providers
            .values()
            .map(|entry| entry.elapsed)
            .max()
            .unwrap_or_default()
    }

    pub fn failed(&self) -> impl Iterator<Item = (ProviderId, &LatencyEntry)> {
        self.providers
            .iter()
            .filter(|(_, entry)| !entry.is_ok())
            .map(|(provider, entry)| (*provider, entry))
    }

    /// Records the total, never below the slowest provider.
    pub fn finish(&mut self, measured: Duration) {
        let total = measured.max(self.max_elapsed());
        self.total_elapsed = total;
        self.total_elapsed_ms = duration_ms(total);
    }
}

/// Joined provider values, each either real or the provider's default.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedResults {
    values: BTreeMap<ProviderId, ProviderValue>,
    latency: LatencyReport,
    joined_at: Instant,
}

impl JoinedResults {
    pub fn value(&self, provider: ProviderId) -> Option<&ProviderValue> {
        self.values.get(&provider)
    }

    /// Removes and returns the value, or the provider's default when the
    /// provider was not part of the fan-out.
    pub fn take(&mut self, provider: ProviderId) -> ProviderValue {
        self.values
            .remove(&provider)
            .unwrap_or_else(|| ProviderValue::default_for(provider))
    }

    pub fn latency(&self) -> &LatencyReport {
        &self.latency
    }

    pub fn into_latency(self) -> LatencyReport {
        self.latency
    }

    pub const fn joined_at(&self) -> Instant {
        self.joined_at
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Waits for every task in `dispatch`. Dropping the returned future aborts
/// the tasks still running.
pub async fn join(dispatch: Dispatch) -> JoinedResults {
    let dispatched_at = dispatch.dispatched_at;
    let settled = join_all(
        dispatch
            .pending
            .into_iter()
            .map(|pending| settle(pending, dispatched_at)),
    )
    .await;
    let joined_at = Instant::now();

    let mut values = BTreeMap::new();
    let mut latency = LatencyReport::default();

    for (descriptor, outcome) in settled {
        let name = descriptor.name();
        let entry = LatencyEntry::from_outcome(&outcome);

        let value = match outcome {
            ProviderOutcome::Success { value, elapsed } => {
                debug!(
                    provider = %name,
                    elapsed_ms = duration_ms(elapsed),
                    records = value.len(),
                    "provider joined"
                );
                value
            }
            ProviderOutcome::Failure { error, elapsed } => {
                warn!(
                    provider = %name,
                    code = error.code(),
                    elapsed_ms = duration_ms(elapsed),
                    error = error.message(),
                    "provider degraded to default"
                );
                descriptor.default_value().clone()
            }
        };

        values.insert(name, value);
        latency.providers.insert(name, entry);
    }

    JoinedResults {
        values,
        latency,
        joined_at,
    }
}

async fn settle(pending: Pending, dispatched_at: Instant) -> (ProviderDescriptor, ProviderOutcome) {
    let Pending { descriptor, task } = pending;
    let outcome = match task {
        PendingTask::Refused(outcome) => outcome,
        PendingTask::Running(handle) => match handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => ProviderOutcome::Failure {
                error: if join_error.is_cancelled() {
                    ProviderError::cancelled(format!("{} task was cancelled", descriptor.name()))
                } else {
                    ProviderError::internal(format!(
                        "{} task failed: {join_error}",
                        descriptor.name()
                    ))
                },
                elapsed: dispatched_at.elapsed(),
            },
        },
    };

    (descriptor, outcome)
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
