//! Unary gRPC transport.
//!
//! The upstream services expose one unary method per provider. Messages are
//! declared by hand with `prost` derives so no build-time codegen is needed.

use std::time::Duration;

use tokio::runtime::Handle;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};

use super::{reject_blank_subject, ProviderEndpoints, TransportKind, UpstreamFuture, UpstreamSource};
use crate::{
    ConfigError, ContentSummary, PaymentRecord, PlanSummary, ProfileSummary, ProviderError,
    ProviderErrorKind, ProviderId, SubjectId, SubscriptionSummary,
};

const PROFILES_PATH: &str = "/switchyard.profile.v1.ProfileGrpcService/GetProfilesByAccountId";
const SUBSCRIPTION_PATH: &str =
    "/switchyard.subscription.v1.SubscriptionGrpcService/GetActiveSubscription";
const BILLING_PATH: &str = "/switchyard.billing.v1.PaymentGrpcService/GetRecentPayments";
const CATALOG_PATH: &str = "/switchyard.content.v1.ContentGrpcService/GetAllContents";

/// Page size requested from the content service.
const CATALOG_PAGE_SIZE: i32 = 100;

pub mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetProfilesRequest {
        #[prost(string, tag = "1")]
        pub account_id: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Profile {
        #[prost(int64, tag = "1")]
        pub id: i64,
        #[prost(string, tag = "2")]
        pub profile_name: String,
        #[prost(string, tag = "3")]
        pub avatar_url: String,
        #[prost(bool, tag = "4")]
        pub is_child_profile: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ProfileListResponse {
        #[prost(message, repeated, tag = "1")]
        pub profiles: Vec<Profile>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetActiveSubscriptionRequest {
        #[prost(string, tag = "1")]
        pub user_id: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Plan {
        #[prost(string, tag = "1")]
        pub plan_name: String,
        #[prost(double, tag = "2")]
        pub price: f64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SubscriptionResponse {
        #[prost(int64, tag = "1")]
        pub id: i64,
        #[prost(string, tag = "2")]
        pub status: String,
        #[prost(string, tag = "3")]
        pub billing_cycle: String,
        #[prost(message, optional, tag = "4")]
        pub plan: Option<Plan>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetPaymentsRequest {
        #[prost(string, tag = "1")]
        pub user_id: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Payment {
        #[prost(int64, tag = "1")]
        pub id: i64,
        #[prost(double, tag = "2")]
        pub amount: f64,
        #[prost(string, tag = "3")]
        pub status: String,
        #[prost(string, tag = "4")]
        pub payment_date: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PaymentListResponse {
        #[prost(message, repeated, tag = "1")]
        pub payments: Vec<Payment>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetAllContentsRequest {
        #[prost(int32, tag = "1")]
        pub page: i32,
        #[prost(int32, tag = "2")]
        pub size: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Content {
        #[prost(int64, tag = "1")]
        pub id: i64,
        #[prost(string, tag = "2")]
        pub title: String,
        #[prost(string, tag = "3")]
        pub content_type: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ContentListResponse {
        #[prost(message, repeated, tag = "1")]
        pub contents: Vec<Content>,
    }
}

/// gRPC transport with one lazily connected channel per provider.
#[derive(Debug, Clone)]
pub struct GrpcSource {
    profiles: Channel,
    subscription: Channel,
    billing: Channel,
    catalog: Channel,
}

impl GrpcSource {
    /// Builds the channels without connecting. Connections are established on
    /// first use and driven by the runtime behind `handle`.
    pub fn connect_lazy(
        endpoints: &ProviderEndpoints,
        handle: &Handle,
    ) -> Result<Self, ConfigError> {
        let _guard = handle.enter();
        Ok(Self {
            profiles: lazy_channel(ProviderId::Profiles, endpoints)?,
            subscription: lazy_channel(ProviderId::Subscription, endpoints)?,
            billing: lazy_channel(ProviderId::Billing, endpoints)?,
            catalog: lazy_channel(ProviderId::Catalog, endpoints)?,
        })
    }

    async fn unary<Req, Resp>(
        &self,
        provider: ProviderId,
        channel: &Channel,
        path: &'static str,
        message: Req,
        budget: Duration,
    ) -> Result<Resp, Status>
    where
        Req: ::prost::Message + Send + Sync + 'static,
        Resp: ::prost::Message + Default + Send + Sync + 'static,
    {
        let mut client = Grpc::new(channel.clone());
        client.ready().await.map_err(|error| {
            Status::unavailable(format!("{provider} channel not ready: {error}"))
        })?;

        let mut request = Request::new(message);
        request.set_timeout(budget);

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = client
            .unary(request, PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }
}

fn lazy_channel(
    provider: ProviderId,
    endpoints: &ProviderEndpoints,
) -> Result<Channel, ConfigError> {
    let url = endpoints.for_provider(provider).to_owned();
    let endpoint =
        Endpoint::from_shared(url.clone()).map_err(|error| ConfigError::InvalidEndpoint {
            provider: provider.as_str(),
            url,
            message: error.to_string(),
        })?;
    Ok(endpoint.connect_lazy())
}

fn map_status(provider: ProviderId, status: &Status) -> ProviderError {
    let kind = match status.code() {
        Code::DeadlineExceeded => ProviderErrorKind::Timeout,
        Code::InvalidArgument => ProviderErrorKind::InvalidRequest,
        Code::Cancelled => ProviderErrorKind::Cancelled,
        // tonic reports undecodable response bodies as Internal
        Code::Internal | Code::DataLoss => ProviderErrorKind::Decode,
        _ => ProviderErrorKind::Unavailable,
    };
    ProviderError::new(
        kind,
        format!(
            "{provider} grpc call failed with {:?}: {}",
            status.code(),
            status.message()
        ),
    )
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

impl From<proto::Profile> for ProfileSummary {
    fn from(value: proto::Profile) -> Self {
        Self {
            id: value.id,
            profile_name: value.profile_name,
            avatar_url: non_empty(value.avatar_url),
            is_child_profile: value.is_child_profile,
        }
    }
}

impl From<proto::SubscriptionResponse> for SubscriptionSummary {
    fn from(value: proto::SubscriptionResponse) -> Self {
        Self {
            id: value.id,
            plan_name: None,
            status: value.status,
            billing_cycle: non_empty(value.billing_cycle),
            plan: value.plan.map(|plan| PlanSummary {
                plan_name: plan.plan_name,
                price: Some(plan.price),
            }),
        }
    }
}

impl From<proto::Payment> for PaymentRecord {
    fn from(value: proto::Payment) -> Self {
        Self {
            id: value.id,
            amount: value.amount,
            payment_status: value.status,
            payment_date: non_empty(value.payment_date),
        }
    }
}

impl From<proto::Content> for ContentSummary {
    fn from(value: proto::Content) -> Self {
        Self {
            id: value.id,
            title: value.title,
            content_type: non_empty(value.content_type),
        }
    }
}

impl UpstreamSource for GrpcSource {
    fn transport(&self) -> TransportKind {
        TransportKind::Grpc
    }

    fn profiles<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Vec<ProfileSummary>> {
        Box::pin(async move {
            reject_blank_subject(ProviderId::Profiles, subject)?;
            let request = proto::GetProfilesRequest {
                account_id: subject.as_str().to_owned(),
            };
            let response: proto::ProfileListResponse = self
                .unary(
                    ProviderId::Profiles,
                    &self.profiles,
                    PROFILES_PATH,
                    request,
                    budget,
                )
                .await
                .map_err(|status| map_status(ProviderId::Profiles, &status))?;

            Ok(response
                .profiles
                .into_iter()
                .map(ProfileSummary::from)
                .collect())
        })
    }

    fn subscription<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Option<SubscriptionSummary>> {
        Box::pin(async move {
            reject_blank_subject(ProviderId::Subscription, subject)?;
            let request = proto::GetActiveSubscriptionRequest {
                user_id: subject.as_str().to_owned(),
            };
            let result: Result<proto::SubscriptionResponse, Status> = self
                .unary(
                    ProviderId::Subscription,
                    &self.subscription,
                    SUBSCRIPTION_PATH,
                    request,
                    budget,
                )
                .await;

            match result {
                Ok(response) => Ok(Some(SubscriptionSummary::from(response))),
                Err(status) if status.code() == Code::NotFound => Ok(None),
                Err(status) => Err(map_status(ProviderId::Subscription, &status)),
            }
        })
    }

    fn billing_history<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Vec<PaymentRecord>> {
        Box::pin(async move {
            reject_blank_subject(ProviderId::Billing, subject)?;
            let request = proto::GetPaymentsRequest {
                user_id: subject.as_str().to_owned(),
            };
            let response: proto::PaymentListResponse = self
                .unary(
                    ProviderId::Billing,
                    &self.billing,
                    BILLING_PATH,
                    request,
                    budget,
                )
                .await
                .map_err(|status| map_status(ProviderId::Billing, &status))?;

            Ok(response
                .payments
                .into_iter()
                .map(PaymentRecord::from)
                .collect())
        })
    }

    fn catalog<'a>(&'a self, budget: Duration) -> UpstreamFuture<'a, Vec<ContentSummary>> {
        Box::pin(async move {
            let request = proto::GetAllContentsRequest {
                page: 0,
                size: CATALOG_PAGE_SIZE,
            };
            let response: proto::ContentListResponse = self
                .unary(
                    ProviderId::Catalog,
                    &self.catalog,
                    CATALOG_PATH,
                    request,
                    budget,
                )
                .await
                .map_err(|status| map_status(ProviderId::Catalog, &status))?;

            Ok(response
                .contents
                .into_iter()
                .map(ContentSummary::from)
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn deadline_exceeded_maps_to_timeout() {
        let error = map_status(ProviderId::Billing, &Status::deadline_exceeded("slow"));

        assert_eq!(error.kind(), ProviderErrorKind::Timeout);
        assert!(error.message().contains("slow"));
    }

    #[test]
    fn invalid_argument_maps_to_invalid_request_and_others_to_unavailable() {
        let invalid = map_status(ProviderId::Profiles, &Status::invalid_argument("bad id"));
        let unavailable = map_status(ProviderId::Profiles, &Status::unavailable("refused"));
        let not_found = map_status(ProviderId::Catalog, &Status::not_found("no titles"));

        assert_eq!(invalid.kind(), ProviderErrorKind::InvalidRequest);
        assert_eq!(unavailable.kind(), ProviderErrorKind::Unavailable);
        assert_eq!(not_found.kind(), ProviderErrorKind::Unavailable);
    }

    #[test]
    fn undecodable_response_statuses_map_to_decode() {
        let internal = map_status(
            ProviderId::Billing,
            &Status::internal("failed to decode Protobuf message: invalid wire type"),
        );
        let data_loss = map_status(ProviderId::Catalog, &Status::data_loss("truncated frame"));

        assert_eq!(internal.kind(), ProviderErrorKind::Decode);
        assert_eq!(data_loss.kind(), ProviderErrorKind::Decode);
        assert!(internal.message().contains("invalid wire type"));
    }

    #[test]
    fn subscription_message_decodes_into_summary_with_nested_plan() {
        let wire = proto::SubscriptionResponse {
            id: 11,
            status: String::from("ACTIVE"),
            billing_cycle: String::new(),
            plan: Some(proto::Plan {
                plan_name: String::from("Premium"),
                price: 15.99,
            }),
        }
        .encode_to_vec();

        let decoded = proto::SubscriptionResponse::decode(wire.as_slice())
            .expect("valid message");
        let summary = SubscriptionSummary::from(decoded).normalized();

        assert_eq!(summary.plan_name.as_deref(), Some("Premium"));
        assert_eq!(summary.billing_cycle, None);
    }

    #[test]
    fn empty_proto_strings_become_absent_fields() {
        let profile = ProfileSummary::from(proto::Profile {
            id: 1,
            profile_name: String::from("Kids"),
            avatar_url: String::new(),
            is_child_profile: true,
        });

        assert_eq!(profile.avatar_url, None);
        assert!(profile.is_child_profile);
    }

    #[tokio::test]
    async fn malformed_endpoint_is_a_config_error() {
        let endpoints = ProviderEndpoints::uniform("not a uri");

        let result = GrpcSource::connect_lazy(&endpoints, &Handle::current());

        assert!(matches!(result, Err(ConfigError::InvalidEndpoint { .. })));
    }
}
