//! Aggregate assembler: pure data construction, no failure modes.

use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::joiner::{JoinedResults, LatencyReport};
use crate::{
    ContentSummary, PaymentRecord, ProfileSummary, ProviderId, ProviderValue, SubjectIdentity,
    SubscriptionSummary, WatchHistory,
};

/// Composite dashboard returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub user: SubjectIdentity,
    pub profiles: Vec<ProfileSummary>,
    pub subscription: Option<SubscriptionSummary>,
    pub recent_payments: Vec<PaymentRecord>,
    pub recommended_contents: Vec<ContentSummary>,
    pub watch_history: WatchHistory,
    pub latency: LatencyReport,
}

/// Builds the dashboard. `started` is taken just after subject resolution;
/// the total runs from there to the end of the join.
pub fn assemble_dashboard(
    user: SubjectIdentity,
    mut joined: JoinedResults,
    started: Instant,
    now: OffsetDateTime,
) -> DashboardResponse {
    let measured = joined.joined_at().saturating_duration_since(started);

    let profiles = match joined.take(ProviderId::Profiles) {
        ProviderValue::Profiles(profiles) => profiles,
        _ => Vec::new(),
    };
    let subscription = match joined.take(ProviderId::Subscription) {
        ProviderValue::Subscription(subscription) => subscription,
        _ => None,
    };
    let recent_payments = match joined.take(ProviderId::Billing) {
        ProviderValue::Billing(payments) => payments,
        _ => Vec::new(),
    };
    let recommended_contents = match joined.take(ProviderId::Catalog) {
        ProviderValue::Catalog(contents) => contents,
        _ => Vec::new(),
    };

    let mut latency = joined.into_latency();
    latency.finish(measured);

    DashboardResponse {
        user,
        profiles,
        subscription,
        recent_payments,
        recommended_contents,
        watch_history: WatchHistory::placeholder(now),
        latency,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use time::format_description::well_known::Rfc3339;
    use tokio::runtime::Handle;

    use super::*;
    use crate::dispatcher::FanOutDispatcher;
    use crate::joiner::join;
    use crate::pool::{OutboundPool, PoolSettings};
    use crate::registry::{ProviderRegistry, Upstreams, UseCase};
    use crate::transport::scripted::sample_payments;
    use crate::transport::{Script, ScriptedSource};
    use crate::{ProviderError, SubjectDirectory, SubjectId, SubjectResolver};

    #[tokio::test]
    async fn dashboard_json_uses_camel_case_sections() {
        let source = ScriptedSource::demo().with(
            ProviderId::Catalog,
            Script::error(ProviderError::unavailable("catalog down")),
        );
        let registry = ProviderRegistry::new(Upstreams::uniform(Arc::new(source)));
        let pool = OutboundPool::on_handle(Handle::current(), PoolSettings::default())
            .expect("pool");
        let dispatcher = FanOutDispatcher::new(Arc::new(pool));
        let subject = SubjectId::from("acct-7");
        let user = SubjectDirectory::demo()
            .resolve(&subject)
            .expect("demo subject");
        let started = Instant::now();
        let now = OffsetDateTime::parse("2026-10-01T12:00:00Z", &Rfc3339)
            .expect("utc timestamp");

        let dispatch = dispatcher.dispatch(registry.descriptors(UseCase::Dashboard), &subject);
        let joined = join(dispatch).await;
        let dashboard = assemble_dashboard(user, joined, started, now);
        let json = serde_json::to_value(&dashboard).expect("serializable");

        assert_eq!(json["user"]["firstName"], "Grace");
        assert_eq!(json["recentPayments"].as_array().map(Vec::len), Some(5));
        assert_eq!(json["recommendedContents"], serde_json::json!([]));
        assert_eq!(json["subscription"]["planName"], "Premium");
        assert_eq!(json["watchHistory"]["recentWatchCount"], 12);
        assert_eq!(json["watchHistory"]["lastWatchedDate"], "2026-10-01T12:00:00Z");
        assert_eq!(
            json["latency"]["providers"]["catalog"]["errorCode"],
            "provider.unavailable"
        );
        assert!(dashboard.latency.total_elapsed >= Duration::from_millis(45));
        assert_eq!(dashboard.recent_payments, sample_payments(5));
    }
}
