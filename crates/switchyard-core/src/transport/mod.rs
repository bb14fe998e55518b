//! Transport adapters.
//!
//! Every transport implements [`UpstreamSource`]: one typed call per
//! provider, with failures already normalised into [`ProviderError`]. The
//! orchestrator never sees a transport-specific error type.
//!
//! | Transport | Type | Wire |
//! |-----------|------|------|
//! | REST | [`RestSource`] | `GET` JSON over HTTP |
//! | GraphQL | [`GraphQlSource`] | `POST /graphql` JSON |
//! | gRPC | [`GrpcSource`] | unary protobuf calls |
//! | Scripted | [`ScriptedSource`] | in-process, deterministic |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{
    ContentSummary, PaymentRecord, ProfileSummary, ProviderError, ProviderId, SubjectId,
    SubscriptionSummary, ValidationError,
};

pub mod graphql;
pub mod grpc;
pub mod http_client;
pub mod rest;
pub mod scripted;

pub use graphql::GraphQlSource;
pub use grpc::GrpcSource;
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};
pub use rest::RestSource;
pub use scripted::{Script, ScriptedSource};

/// Wire protocol used to reach an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Rest,
    Graphql,
    Grpc,
    Mock,
}

impl TransportKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Graphql => "graphql",
            Self::Grpc => "grpc",
            Self::Mock => "mock",
        }
    }
}

impl Display for TransportKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "graphql" => Ok(Self::Graphql),
            "grpc" => Ok(Self::Grpc),
            "mock" => Ok(Self::Mock),
            other => Err(ValidationError::InvalidTransport {
                value: other.to_owned(),
            }),
        }
    }
}

/// Base URL of each provider's upstream service for one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub profiles: String,
    pub subscription: String,
    pub billing: String,
    pub catalog: String,
}

impl ProviderEndpoints {
    /// Uses the same base URL for every provider.
    pub fn uniform(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            profiles: base_url.clone(),
            subscription: base_url.clone(),
            billing: base_url.clone(),
            catalog: base_url,
        }
    }

    pub fn for_provider(&self, provider: ProviderId) -> &str {
        let url = match provider {
            ProviderId::Profiles => &self.profiles,
            ProviderId::Subscription => &self.subscription,
            ProviderId::Billing => &self.billing,
            ProviderId::Catalog => &self.catalog,
        };
        url.trim_end_matches('/')
    }
}

pub type UpstreamFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Transport adapter contract.
///
/// Implementations must honor `budget` where the underlying protocol allows
/// it; the dispatcher additionally bounds every call by the same budget, so a
/// transport that cannot cancel still never stalls the join.
///
/// Implementations must be `Send + Sync`: one instance serves every
/// concurrent aggregate request and must not keep per-request mutable state.
pub trait UpstreamSource: Send + Sync {
    fn transport(&self) -> TransportKind;

    /// Lists the viewer profiles of an account.
    fn profiles<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Vec<ProfileSummary>>;

    /// Fetches the active subscription; `Ok(None)` when the account has none.
    fn subscription<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Option<SubscriptionSummary>>;

    /// Fetches the billing history, most recent first.
    fn billing_history<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Vec<PaymentRecord>>;

    /// Lists catalog content. Not filtered by subject.
    fn catalog<'a>(&'a self, budget: Duration) -> UpstreamFuture<'a, Vec<ContentSummary>>;
}

pub(crate) fn map_http_error(provider: ProviderId, error: HttpError) -> ProviderError {
    match error.kind() {
        HttpErrorKind::Timeout => ProviderError::new(
            crate::ProviderErrorKind::Timeout,
            format!("{provider} transport timeout: {}", error.message()),
        ),
        HttpErrorKind::Connect | HttpErrorKind::Other => {
            ProviderError::unavailable(format!("{provider} transport error: {}", error.message()))
        }
    }
}

pub(crate) fn check_status(
    provider: ProviderId,
    response: &HttpResponse,
) -> Result<(), ProviderError> {
    if response.is_success() {
        return Ok(());
    }

    if response.status == 400 {
        return Err(ProviderError::invalid_request(format!(
            "{provider} upstream rejected the request (status 400)"
        )));
    }

    Err(ProviderError::unavailable(format!(
        "{provider} upstream returned status {}",
        response.status
    )))
}

pub(crate) fn decode_json<T: DeserializeOwned>(
    provider: ProviderId,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|error| {
        ProviderError::decode(format!("{provider} response decode failed: {error}"))
    })
}

pub(crate) fn reject_blank_subject(
    provider: ProviderId,
    subject: &SubjectId,
) -> Result<(), ProviderError> {
    if subject.as_str().trim().is_empty() {
        return Err(ProviderError::invalid_request(format!(
            "{provider} requires a non-empty subject id"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorKind;

    #[test]
    fn transport_kind_parses_case_insensitively() {
        assert_eq!("GraphQL".parse::<TransportKind>(), Ok(TransportKind::Graphql));
        assert!("soap".parse::<TransportKind>().is_err());
    }

    #[test]
    fn endpoints_strip_trailing_slash() {
        let endpoints = ProviderEndpoints::uniform("http://localhost:9100/");

        assert_eq!(endpoints.for_provider(ProviderId::Billing), "http://localhost:9100");
    }

    #[test]
    fn http_timeout_maps_to_timeout_kind() {
        let error = map_http_error(ProviderId::Billing, HttpError::timeout("slow"));

        assert_eq!(error.kind(), ProviderErrorKind::Timeout);
        assert!(error.message().starts_with("billing"));
    }

    #[test]
    fn bad_request_status_maps_to_invalid_request() {
        let error = check_status(ProviderId::Profiles, &HttpResponse::new(400, ""))
            .expect_err("400 is not success");

        assert_eq!(error.kind(), ProviderErrorKind::InvalidRequest);
    }

    #[test]
    fn server_error_status_maps_to_unavailable() {
        let error = check_status(ProviderId::Catalog, &HttpResponse::new(503, ""))
            .expect_err("503 is not success");

        assert_eq!(error.kind(), ProviderErrorKind::Unavailable);
        assert!(error.message().contains("503"));
    }

    #[test]
    fn malformed_body_maps_to_decode() {
        let error = decode_json::<Vec<ProfileSummary>>(ProviderId::Profiles, "{not json")
            .expect_err("malformed body");

        assert_eq!(error.kind(), ProviderErrorKind::Decode);
    }
}
