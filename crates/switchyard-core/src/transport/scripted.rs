use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{TransportKind, UpstreamFuture, UpstreamSource};
use crate::{
    ContentSummary, PaymentRecord, PlanSummary, ProfileSummary, ProviderError, ProviderId,
    ProviderValue, SubjectId, SubscriptionSummary,
};

type DeriveFn = Arc<dyn Fn(Option<&SubjectId>) -> ProviderValue + Send + Sync>;

#[derive(Clone)]
enum Outcome {
    Value(ProviderValue),
    Derived(DeriveFn),
    Error(ProviderError),
    Panic(String),
    Hang,
}

/// Scripted behavior of one provider: wait `delay`, then produce the outcome.
#[derive(Clone)]
pub struct Script {
    delay: Duration,
    outcome: Outcome,
}

impl Script {
    fn new(outcome: Outcome) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome,
        }
    }

    pub fn value(value: ProviderValue) -> Self {
        Self::new(Outcome::Value(value))
    }

    /// Computes the value from the subject (`None` for the catalog call).
    pub fn derived(
        derive: impl Fn(Option<&SubjectId>) -> ProviderValue + Send + Sync + 'static,
    ) -> Self {
        Self::new(Outcome::Derived(Arc::new(derive)))
    }

    pub fn error(error: ProviderError) -> Self {
        Self::new(Outcome::Error(error))
    }

    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(Outcome::Panic(message.into()))
    }

    /// Never completes.
    pub fn hang() -> Self {
        Self::new(Outcome::Hang)
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl Debug for Script {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let outcome = match &self.outcome {
            Outcome::Value(value) => format!("value({} records)", value.len()),
            Outcome::Derived(_) => String::from("derived"),
            Outcome::Error(error) => format!("error({})", error.code()),
            Outcome::Panic(message) => format!("panic({message})"),
            Outcome::Hang => String::from("hang"),
        };
        f.debug_struct("Script")
            .field("delay", &self.delay)
            .field("outcome", &outcome)
            .finish()
    }
}

/// Deterministic in-process transport.
#[derive(Debug)]
pub struct ScriptedSource {
    scripts: HashMap<ProviderId, Script>,
    calls: [AtomicUsize; 4],
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            calls: Default::default(),
        }
    }

    pub fn with(mut self, provider: ProviderId, script: Script) -> Self {
        self.scripts.insert(provider, script);
        self
    }

    /// Every provider succeeds with subject-specific sample data.
    pub fn demo() -> Self {
        Self::new()
            .with(
                ProviderId::Profiles,
                Script::derived(|subject| ProviderValue::Profiles(sample_profiles(subject)))
                    .after(Duration::from_millis(30)),
            )
            .with(
                ProviderId::Subscription,
                Script::value(ProviderValue::Subscription(Some(sample_subscription())))
                    .after(Duration::from_millis(45)),
            )
            .with(
                ProviderId::Billing,
                Script::value(ProviderValue::Billing(sample_payments(7)))
                    .after(Duration::from_millis(40)),
            )
            .with(
                ProviderId::Catalog,
                Script::value(ProviderValue::Catalog(sample_contents(12)))
                    .after(Duration::from_millis(60)),
            )
    }

    /// Number of calls received for `provider` so far.
    pub fn calls(&self, provider: ProviderId) -> usize {
        self.calls[provider.index()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        ProviderId::ALL
            .iter()
            .map(|provider| self.calls(*provider))
            .sum()
    }

    async fn play(
        &self,
        provider: ProviderId,
        subject: Option<&SubjectId>,
    ) -> Result<ProviderValue, ProviderError> {
        self.calls[provider.index()].fetch_add(1, Ordering::SeqCst);

        let script = self.scripts.get(&provider).ok_or_else(|| {
            ProviderError::unavailable(format!("{provider} has no scripted behavior"))
        })?;

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        let value = match &script.outcome {
            Outcome::Value(value) => value.clone(),
            Outcome::Derived(derive) => derive(subject),
            Outcome::Error(error) => return Err(error.clone()),
            Outcome::Panic(message) => panic!("{message}"),
            Outcome::Hang => std::future::pending::<ProviderValue>().await,
        };

        if value.provider() != provider {
            return Err(ProviderError::internal(format!(
                "{provider} was scripted with a {} value",
                value.provider()
            )));
        }
        Ok(value)
    }
}

impl UpstreamSource for ScriptedSource {
    fn transport(&self) -> TransportKind {
        TransportKind::Mock
    }

    fn profiles<'a>(
        &'a self,
        subject: &'a SubjectId,
        _budget: Duration,
    ) -> UpstreamFuture<'a, Vec<ProfileSummary>> {
        Box::pin(async move {
            match self.play(ProviderId::Profiles, Some(subject)).await? {
                ProviderValue::Profiles(profiles) => Ok(profiles),
                _ => Ok(Vec::new()),
            }
        })
    }

    fn subscription<'a>(
        &'a self,
        subject: &'a SubjectId,
        _budget: Duration,
    ) -> UpstreamFuture<'a, Option<SubscriptionSummary>> {
        Box::pin(async move {
            match self.play(ProviderId::Subscription, Some(subject)).await? {
                ProviderValue::Subscription(subscription) => Ok(subscription),
                _ => Ok(None),
            }
        })
    }

    fn billing_history<'a>(
        &'a self,
        subject: &'a SubjectId,
        _budget: Duration,
    ) -> UpstreamFuture<'a, Vec<PaymentRecord>> {
        Box::pin(async move {
            match self.play(ProviderId::Billing, Some(subject)).await? {
                ProviderValue::Billing(payments) => Ok(payments),
                _ => Ok(Vec::new()),
            }
        })
    }

    fn catalog<'a>(&'a self, _budget: Duration) -> UpstreamFuture<'a, Vec<ContentSummary>> {
        Box::pin(async move {
            match self.play(ProviderId::Catalog, None).await? {
                ProviderValue::Catalog(contents) => Ok(contents),
                _ => Ok(Vec::new()),
            }
        })
    }
}

pub fn sample_profiles(subject: Option<&SubjectId>) -> Vec<ProfileSummary> {
    let owner = subject.map_or("guest", SubjectId::as_str);
    vec![
        ProfileSummary {
            id: 1,
            profile_name: format!("{owner} main"),
            avatar_url: Some(String::from("https://cdn.example.test/avatars/1.png")),
            is_child_profile: false,
        },
        ProfileSummary {
            id: 2,
            profile_name: format!("{owner} kids"),
            avatar_url: None,
            is_child_profile: true,
        },
    ]
}

pub fn sample_subscription() -> SubscriptionSummary {
    SubscriptionSummary {
        id: 501,
        plan_name: None,
        status: String::from("ACTIVE"),
        billing_cycle: Some(String::from("MONTHLY")),
        plan: Some(PlanSummary {
            plan_name: String::from("Premium"),
            price: Some(15.99),
        }),
    }
}

pub fn sample_payments(count: usize) -> Vec<PaymentRecord> {
    (0..count)
        .map(|index| PaymentRecord {
            id: 900 + index as i64,
            amount: 15.99,
            payment_status: String::from("COMPLETED"),
            payment_date: Some(format!("2026-{:02}-01", 12 - (index % 12))),
        })
        .collect()
}

pub fn sample_contents(count: usize) -> Vec<ContentSummary> {
    (0..count)
        .map(|index| {
            let content_type = if index % 3 == 0 { "SERIES" } else { "MOVIE" };
            ContentSummary {
                id: 100 + index as i64,
                title: format!("Feature #{}", index + 1),
                content_type: Some(String::from(content_type)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorKind;

    #[tokio::test]
    async fn unscripted_provider_is_unavailable_and_counted() {
        let source = ScriptedSource::new();

        let error = source
            .catalog(Duration::from_millis(10))
            .await
            .expect_err("no script");

        assert_eq!(error.kind(), ProviderErrorKind::Unavailable);
        assert_eq!(source.calls(ProviderId::Catalog), 1);
    }

    #[tokio::test]
    async fn mismatched_value_is_internal_error() {
        let source = ScriptedSource::new().with(
            ProviderId::Profiles,
            Script::value(ProviderValue::Catalog(Vec::new())),
        );

        let error = source
            .profiles(&SubjectId::from("acct-1"), Duration::from_millis(10))
            .await
            .expect_err("wrong variant");

        assert_eq!(error.kind(), ProviderErrorKind::Internal);
    }

    #[tokio::test]
    async fn derived_script_sees_the_subject() {
        let source = ScriptedSource::new().with(
            ProviderId::Profiles,
            Script::derived(|subject| ProviderValue::Profiles(sample_profiles(subject))),
        );

        let profiles = source
            .profiles(&SubjectId::from("acct-9"), Duration::from_millis(10))
            .await
            .expect("derived profiles");

        assert_eq!(profiles[0].profile_name, "acct-9 main");
    }
}
