//! Provider identifiers, values and outcomes.
//!
//! A provider call always ends in exactly one [`ProviderOutcome`]: the typed
//! [`ProviderValue`] it produced, or a [`ProviderError`] classifying why it
//! did not. Both variants carry the elapsed time.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ContentSummary, PaymentRecord, ProfileSummary, SubscriptionSummary, ValidationError};

/// Canonical upstream provider names used in registries and latency reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Profiles,
    Subscription,
    Billing,
    Catalog,
}

impl ProviderId {
    pub const ALL: [Self; 4] = [
        Self::Profiles,
        Self::Subscription,
        Self::Billing,
        Self::Catalog,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::Subscription => "subscription",
            Self::Billing => "billing",
            Self::Catalog => "catalog",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Profiles => 0,
            Self::Subscription => 1,
            Self::Billing => 2,
            Self::Catalog => 3,
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "profiles" => Ok(Self::Profiles),
            "subscription" => Ok(Self::Subscription),
            "billing" => Ok(Self::Billing),
            "catalog" => Ok(Self::Catalog),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Provider failure classification. Every transport collapses its own
/// failure modes into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Unavailable,
    Timeout,
    Decode,
    InvalidRequest,
    Cancelled,
    Internal,
}

/// Structured provider error. Non-fatal by construction: the joiner turns
/// it into the provider's default value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message)
    }

    pub fn timeout(budget: Duration) -> Self {
        Self::new(
            ProviderErrorKind::Timeout,
            format!("no response within {}ms budget", budget.as_millis()),
        )
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Decode, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Internal, message)
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::Unavailable => "provider.unavailable",
            ProviderErrorKind::Timeout => "provider.timeout",
            ProviderErrorKind::Decode => "provider.decode",
            ProviderErrorKind::InvalidRequest => "provider.invalid_request",
            ProviderErrorKind::Cancelled => "provider.cancelled",
            ProviderErrorKind::Internal => "provider.internal",
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ProviderError {}

/// Type-erased provider payload. Each [`ProviderId`] maps to exactly one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderValue {
    Profiles(Vec<ProfileSummary>),
    Subscription(Option<SubscriptionSummary>),
    Billing(Vec<PaymentRecord>),
    Catalog(Vec<ContentSummary>),
}

impl ProviderValue {
    /// The value a provider contributes when it fails.
    pub const fn default_for(provider: ProviderId) -> Self {
        match provider {
            ProviderId::Profiles => Self::Profiles(Vec::new()),
            ProviderId::Subscription => Self::Subscription(None),
            ProviderId::Billing => Self::Billing(Vec::new()),
            ProviderId::Catalog => Self::Catalog(Vec::new()),
        }
    }

    pub const fn provider(&self) -> ProviderId {
        match self {
            Self::Profiles(_) => ProviderId::Profiles,
            Self::Subscription(_) => ProviderId::Subscription,
            Self::Billing(_) => ProviderId::Billing,
            Self::Catalog(_) => ProviderId::Catalog,
        }
    }

    /// Number of records carried, for logging.
    pub fn len(&self) -> usize {
        match self {
            Self::Profiles(values) => values.len(),
            Self::Subscription(value) => usize::from(value.is_some()),
            Self::Billing(values) => values.len(),
            Self::Catalog(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one provider task.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Success {
        value: ProviderValue,
        elapsed: Duration,
    },
    Failure {
        error: ProviderError,
        elapsed: Duration,
    },
}

impl ProviderOutcome {
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Success { elapsed, .. } | Self::Failure { elapsed, .. } => *elapsed,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_round_trips_through_str() {
        for provider in ProviderId::ALL {
            assert_eq!(provider.as_str().parse::<ProviderId>(), Ok(provider));
        }
        assert!(matches!(
            "ledger".parse::<ProviderId>(),
            Err(ValidationError::InvalidProvider { .. })
        ));
    }

    #[test]
    fn defaults_match_provider_and_are_empty() {
        for provider in ProviderId::ALL {
            let value = ProviderValue::default_for(provider);
            assert_eq!(value.provider(), provider);
            assert!(value.is_empty());
        }
    }

    #[test]
    fn timeout_error_mentions_budget() {
        let error = ProviderError::timeout(Duration::from_millis(100));

        assert_eq!(error.kind(), ProviderErrorKind::Timeout);
        assert_eq!(error.code(), "provider.timeout");
        assert!(error.message().contains("100ms"));
    }
}
