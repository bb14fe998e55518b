//! Provider registry: which providers a use case fans out to, and how.
//!
//! Descriptors are built fresh for every aggregate request. Building them
//! performs no I/O; each one only captures a shared handle to its transport.

use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::transport::UpstreamSource;
use crate::{ProviderError, ProviderId, ProviderValue, SubjectId, ValidationError};

pub const DEFAULT_BUDGET: Budget = Budget(Duration::from_millis(1_000));
pub const DEFAULT_BILLING_LIMIT: usize = 5;
pub const DEFAULT_CATALOG_LIMIT: usize = 100;

/// Aggregation use cases served by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseCase {
    Dashboard,
}

impl UseCase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
        }
    }

    pub const fn providers(self) -> &'static [ProviderId] {
        match self {
            Self::Dashboard => &ProviderId::ALL,
        }
    }
}

impl Display for UseCase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UseCase {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dashboard" => Ok(Self::Dashboard),
            other => Err(ValidationError::InvalidUseCase {
                value: other.to_owned(),
            }),
        }
    }
}

/// Mandatory, non-zero timeout budget of one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Budget(Duration);

impl Budget {
    /// `None` for a zero duration.
    pub const fn new(duration: Duration) -> Option<Self> {
        if duration.is_zero() {
            None
        } else {
            Some(Self(duration))
        }
    }

    pub const fn from_millis(millis: u64) -> Option<Self> {
        Self::new(Duration::from_millis(millis))
    }

    pub const fn get(self) -> Duration {
        self.0
    }
}

pub type InvokeFuture = Pin<Box<dyn Future<Output = Result<ProviderValue, ProviderError>> + Send>>;
type InvokeFn = Arc<dyn Fn(SubjectId, Duration) -> InvokeFuture + Send + Sync>;

/// One fan-out target: a name, the call, the value used when the call fails
/// and the mandatory timeout budget.
#[derive(Clone)]
pub struct ProviderDescriptor {
    name: ProviderId,
    invoke: InvokeFn,
    default_value: ProviderValue,
    budget: Budget,
}

impl ProviderDescriptor {
    pub fn new(
        name: ProviderId,
        default_value: ProviderValue,
        budget: Budget,
        invoke: impl Fn(SubjectId, Duration) -> InvokeFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            invoke: Arc::new(invoke),
            default_value,
            budget,
        }
    }

    pub fn profiles(upstream: Arc<dyn UpstreamSource>, budget: Budget) -> Self {
        Self::new(
            ProviderId::Profiles,
            ProviderValue::default_for(ProviderId::Profiles),
            budget,
            move |subject, budget| {
                let upstream = Arc::clone(&upstream);
                Box::pin(async move {
                    upstream
                        .profiles(&subject, budget)
                        .await
                        .map(ProviderValue::Profiles)
                })
            },
        )
    }

    pub fn subscription(upstream: Arc<dyn UpstreamSource>, budget: Budget) -> Self {
        Self::new(
            ProviderId::Subscription,
            ProviderValue::default_for(ProviderId::Subscription),
            budget,
            move |subject, budget| {
                let upstream = Arc::clone(&upstream);
                Box::pin(async move {
                    let subscription = upstream.subscription(&subject, budget).await?;
                    Ok(ProviderValue::Subscription(
                        subscription.map(|subscription| subscription.normalized()),
                    ))
                })
            },
        )
    }

    pub fn billing(
        upstream: Arc<dyn UpstreamSource>,
        budget: Budget,
        limit: Option<usize>,
    ) -> Self {
        Self::new(
            ProviderId::Billing,
            ProviderValue::default_for(ProviderId::Billing),
            budget,
            move |subject, budget| {
                let upstream = Arc::clone(&upstream);
                Box::pin(async move {
                    let mut payments = upstream.billing_history(&subject, budget).await?;
                    if let Some(limit) = limit {
                        payments.truncate(limit);
                    }
                    Ok(ProviderValue::Billing(payments))
                })
            },
        )
    }

    pub fn catalog(
        upstream: Arc<dyn UpstreamSource>,
        budget: Budget,
        limit: Option<usize>,
    ) -> Self {
        Self::new(
            ProviderId::Catalog,
            ProviderValue::default_for(ProviderId::Catalog),
            budget,
            move |_subject, budget| {
                let upstream = Arc::clone(&upstream);
                Box::pin(async move {
                    let mut contents = upstream.catalog(budget).await?;
                    if let Some(limit) = limit {
                        contents.truncate(limit);
                    }
                    Ok(ProviderValue::Catalog(contents))
                })
            },
        )
    }

    pub const fn name(&self) -> ProviderId {
        self.name
    }

    pub const fn budget(&self) -> Duration {
        self.budget.get()
    }

    pub fn default_value(&self) -> &ProviderValue {
        &self.default_value
    }

    /// Starts the call. The returned future owns everything it needs.
    pub fn invoke(&self, subject: SubjectId) -> InvokeFuture {
        (self.invoke)(subject, self.budget.get())
    }
}

impl Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("default_value", &self.default_value)
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

/// Transport used for each provider. Providers may use different transports.
#[derive(Clone)]
pub struct Upstreams {
    sources: [Arc<dyn UpstreamSource>; 4],
}

impl Upstreams {
    /// Routes every provider through one source.
    pub fn uniform(source: Arc<dyn UpstreamSource>) -> Self {
        Self {
            sources: [
                Arc::clone(&source),
                Arc::clone(&source),
                Arc::clone(&source),
                source,
            ],
        }
    }

    pub fn with(mut self, provider: ProviderId, source: Arc<dyn UpstreamSource>) -> Self {
        self.sources[provider.index()] = source;
        self
    }

    pub fn get(&self, provider: ProviderId) -> &Arc<dyn UpstreamSource> {
        &self.sources[provider.index()]
    }
}

impl Debug for Upstreams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for provider in ProviderId::ALL {
            map.entry(&provider.as_str(), &self.get(provider).transport().as_str());
        }
        map.finish()
    }
}

/// Per-provider call policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPolicy {
    pub budget: Budget,
    /// Maximum number of records kept; `None` keeps everything.
    pub limit: Option<usize>,
}

impl ProviderPolicy {
    pub const fn default_for(provider: ProviderId) -> Self {
        let limit = match provider {
            ProviderId::Billing => Some(DEFAULT_BILLING_LIMIT),
            ProviderId::Catalog => Some(DEFAULT_CATALOG_LIMIT),
            ProviderId::Profiles | ProviderId::Subscription => None,
        };
        Self {
            budget: DEFAULT_BUDGET,
            limit,
        }
    }
}

/// Registry snapshot row used by the `providers` CLI command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSnapshot {
    pub name: ProviderId,
    pub transport: crate::TransportKind,
    pub budget: Budget,
    pub limit: Option<usize>,
}

/// Produces the ordered descriptor list for a use case.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    upstreams: Upstreams,
    policies: [ProviderPolicy; 4],
}

impl ProviderRegistry {
    pub fn new(upstreams: Upstreams) -> Self {
        Self {
            upstreams,
            policies: ProviderId::ALL.map(ProviderPolicy::default_for),
        }
    }

    pub fn with_policy(mut self, provider: ProviderId, policy: ProviderPolicy) -> Self {
        self.policies[provider.index()] = policy;
        self
    }

    pub fn policy(&self, provider: ProviderId) -> ProviderPolicy {
        self.policies[provider.index()]
    }

    pub fn upstreams(&self) -> &Upstreams {
        &self.upstreams
    }

    pub fn descriptor(&self, provider: ProviderId) -> ProviderDescriptor {
        let policy = self.policy(provider);
        let upstream = Arc::clone(self.upstreams.get(provider));
        match provider {
            ProviderId::Profiles => ProviderDescriptor::profiles(upstream, policy.budget),
            ProviderId::Subscription => ProviderDescriptor::subscription(upstream, policy.budget),
            ProviderId::Billing => {
                ProviderDescriptor::billing(upstream, policy.budget, policy.limit)
            }
            ProviderId::Catalog => {
                ProviderDescriptor::catalog(upstream, policy.budget, policy.limit)
            }
        }
    }

    pub fn descriptors(&self, use_case: UseCase) -> Vec<ProviderDescriptor> {
        use_case
            .providers()
            .iter()
            .map(|provider| self.descriptor(*provider))
            .collect()
    }

    pub fn snapshot(&self, use_case: UseCase) -> Vec<ProviderSnapshot> {
        use_case
            .providers()
            .iter()
            .map(|provider| {
                let policy = self.policy(*provider);
                ProviderSnapshot {
                    name: *provider,
                    transport: self.upstreams.get(*provider).transport(),
                    budget: policy.budget,
                    limit: policy.limit,
                }
            })
            .collect()
    }
}
