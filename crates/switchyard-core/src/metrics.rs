//! Process-wide provider statistics.
//!
//! Counters outlive any single aggregate request and are updated with plain
//! atomic increments after each join.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::joiner::LatencyReport;
use crate::{ProviderErrorKind, ProviderId};

#[derive(Debug, Default)]
struct ProviderCounters {
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    total_elapsed_us: AtomicU64,
    max_elapsed_us: AtomicU64,
}

/// Running statistics for every provider.
#[derive(Debug, Default)]
pub struct ProviderMetrics {
    providers: [ProviderCounters; 4],
    aggregates: AtomicU64,
    subjects_not_found: AtomicU64,
}

/// Point-in-time copy of one provider's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub mean_elapsed_us: u64,
    pub max_elapsed_us: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub aggregates: u64,
    pub subjects_not_found: u64,
    pub providers: BTreeMap<ProviderId, ProviderStats>,
}

impl ProviderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one request's latency report into the counters.
    pub fn record(&self, report: &LatencyReport) {
        self.aggregates.fetch_add(1, Ordering::Relaxed);

        for (provider, entry) in &report.providers {
            let counters = &self.providers[provider.index()];
            let elapsed_us = u64::try_from(entry.elapsed.as_micros()).unwrap_or(u64::MAX);

            counters.calls.fetch_add(1, Ordering::Relaxed);
            if entry.is_ok() {
                counters.successes.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.failures.fetch_add(1, Ordering::Relaxed);
            }
            if entry.error_kind == Some(ProviderErrorKind::Timeout) {
                counters.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            counters
                .total_elapsed_us
                .fetch_add(elapsed_us, Ordering::Relaxed);
            counters
                .max_elapsed_us
                .fetch_max(elapsed_us, Ordering::Relaxed);
        }
    }

    pub fn record_subject_not_found(&self) {
        self.subjects_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn provider(&self, provider: ProviderId) -> ProviderStats {
        let counters = &self.providers[provider.index()];
        let calls = counters.calls.load(Ordering::Relaxed);
        let total = counters.total_elapsed_us.load(Ordering::Relaxed);

        ProviderStats {
            calls,
            successes: counters.successes.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            timeouts: counters.timeouts.load(Ordering::Relaxed),
            mean_elapsed_us: total.checked_div(calls).unwrap_or(0),
            max_elapsed_us: counters.max_elapsed_us.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            aggregates: self.aggregates.load(Ordering::Relaxed),
            subjects_not_found: self.subjects_not_found.load(Ordering::Relaxed),
            providers: ProviderId::ALL
                .into_iter()
                .map(|provider| (provider, self.provider(provider)))
                .collect(),
        }
    }
}
