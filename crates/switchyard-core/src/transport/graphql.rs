use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{
    check_status, decode_json, map_http_error, reject_blank_subject, HttpClient, HttpRequest,
    ProviderEndpoints, TransportKind, UpstreamFuture, UpstreamSource,
};
use crate::{
    ContentSummary, PaymentRecord, ProfileSummary, ProviderError, ProviderId, SubjectId,
    SubscriptionSummary,
};

const PROFILES_QUERY: &str = "query GetProfilesByAccountId($accountId: String!) { \
    getProfilesByAccountId(accountId: $accountId) { id profileName avatarUrl isChildProfile } }";

const SUBSCRIPTION_QUERY: &str = "query GetActiveSubscription($userId: String!) { \
    getActiveSubscription(userId: $userId) { id planName status billingCycle } }";

const BILLING_QUERY: &str = "query GetBillingHistory($userId: String!) { \
    getBillingHistory(userId: $userId) { id amount status paymentDate } }";

const CATALOG_QUERY: &str = "query GetAllContents { getAllContents { id title contentType } }";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    message: String,
}

/// GraphQL transport: one `POST {url}/graphql` per provider call.
#[derive(Clone)]
pub struct GraphQlSource {
    http_client: Arc<dyn HttpClient>,
    endpoints: ProviderEndpoints,
}

impl GraphQlSource {
    pub fn new(http_client: Arc<dyn HttpClient>, endpoints: ProviderEndpoints) -> Self {
        Self {
            http_client,
            endpoints,
        }
    }

    /// Runs one query and extracts `data.<field>`. A `null` field yields `None`.
    async fn query<T: DeserializeOwned>(
        &self,
        provider: ProviderId,
        field: &'static str,
        document: &'static str,
        variables: Value,
        budget: Duration,
    ) -> Result<Option<T>, ProviderError> {
        let body = json!({ "query": document, "variables": variables })
            .to_string();
        let url = format!("{}/graphql", self.endpoints.for_provider(provider));
        let request = HttpRequest::post(url)
            .with_json_body(body)
            .with_timeout(budget);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| map_http_error(provider, error))?;
        check_status(provider, &response)?;

        let envelope: Envelope = decode_json(provider, &response.body)?;
        if let Some(first) = envelope.errors.first() {
            return Err(ProviderError::unavailable(format!(
                "{provider} graphql query {field} returned {} error(s): {}",
                envelope.errors.len(),
                first.message
            )));
        }

        let mut data = envelope.data.ok_or_else(|| {
            ProviderError::decode(format!("{provider} graphql response has no data"))
        })?;
        let value = data.remove(field).ok_or_else(|| {
            ProviderError::decode(format!("{provider} graphql response is missing data.{field}"))
        })?;

        if value.is_null() {
            return Ok(None);
        }

        serde_json::from_value(value).map(Some).map_err(|error| {
            ProviderError::decode(format!("{provider} graphql data.{field} decode failed: {error}"))
        })
    }
}

impl UpstreamSource for GraphQlSource {
    fn transport(&self) -> TransportKind {
        TransportKind::Graphql
    }

    fn profiles<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Vec<ProfileSummary>> {
        Box::pin(async move {
            reject_blank_subject(ProviderId::Profiles, subject)?;
            let profiles = self
                .query(
                    ProviderId::Profiles,
                    "getProfilesByAccountId",
                    PROFILES_QUERY,
                    json!({ "accountId": subject.as_str() }),
                    budget,
                )
                .await?;
            Ok(profiles.unwrap_or_default())
        })
    }

    fn subscription<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Option<SubscriptionSummary>> {
        Box::pin(async move {
            reject_blank_subject(ProviderId::Subscription, subject)?;
            self.query(
                ProviderId::Subscription,
                "getActiveSubscription",
                SUBSCRIPTION_QUERY,
                json!({ "userId": subject.as_str() }),
                budget,
            )
            .await
        })
    }

    fn billing_history<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Vec<PaymentRecord>> {
        Box::pin(async move {
            reject_blank_subject(ProviderId::Billing, subject)?;
            let payments = self
                .query(
                    ProviderId::Billing,
                    "getBillingHistory",
                    BILLING_QUERY,
                    json!({ "userId": subject.as_str() }),
                    budget,
                )
                .await?;
            Ok(payments.unwrap_or_default())
        })
    }

    fn catalog<'a>(&'a self, budget: Duration) -> UpstreamFuture<'a, Vec<ContentSummary>> {
        Box::pin(async move {
            let contents = self
                .query(
                    ProviderId::Catalog,
                    "getAllContents",
                    CATALOG_QUERY,
                    json!({}),
                    budget,
                )
                .await?;
            Ok(contents.unwrap_or_default())
        })
    }
}
