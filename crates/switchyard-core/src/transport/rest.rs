use std::sync::Arc;
use std::time::Duration;

use super::{
    check_status, decode_json, map_http_error, reject_blank_subject, HttpClient, HttpRequest,
    HttpResponse, ProviderEndpoints, TransportKind, UpstreamFuture, UpstreamSource,
};
use crate::{
    ContentSummary, PaymentRecord, ProfileSummary, ProviderError, ProviderId, SubjectId,
    SubscriptionSummary,
};

const USER_HEADER: &str = "X-User-Id";

/// Plain JSON-over-HTTP transport.
#[derive(Clone)]
pub struct RestSource {
    http_client: Arc<dyn HttpClient>,
    endpoints: ProviderEndpoints,
}

impl RestSource {
    pub fn new(http_client: Arc<dyn HttpClient>, endpoints: ProviderEndpoints) -> Self {
        Self {
            http_client,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    async fn send(
        &self,
        provider: ProviderId,
        request: HttpRequest,
    ) -> Result<HttpResponse, ProviderError> {
        self.http_client
            .execute(request)
            .await
            .map_err(|error| map_http_error(provider, error))
    }

    fn url(&self, provider: ProviderId, path: &str) -> String {
        format!("{}{path}", self.endpoints.for_provider(provider))
    }
}

impl UpstreamSource for RestSource {
    fn transport(&self) -> TransportKind {
        TransportKind::Rest
    }

    fn profiles<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Vec<ProfileSummary>> {
        Box::pin(async move {
            reject_blank_subject(ProviderId::Profiles, subject)?;

            let path = format!(
                "/api/profiles/account/{}",
                urlencoding::encode(subject.as_str())
            );
            let request = HttpRequest::get(self.url(ProviderId::Profiles, &path))
                .with_timeout(budget);
            let response = self.send(ProviderId::Profiles, request).await?;
            check_status(ProviderId::Profiles, &response)?;

            decode_json(ProviderId::Profiles, &response.body)
        })
    }

    fn subscription<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Option<SubscriptionSummary>> {
        Box::pin(async move {
            reject_blank_subject(ProviderId::Subscription, subject)?;

            let request = HttpRequest::get(
                self.url(ProviderId::Subscription, "/api/subscription/my-subscription"),
            )
            .with_header(USER_HEADER, subject.as_str())
            .with_timeout(budget);
            let response = self.send(ProviderId::Subscription, request).await?;

            // No active subscription is reported as 404 or an empty body.
            if response.status == 404 || response.body.trim().is_empty() {
                return Ok(None);
            }
            check_status(ProviderId::Subscription, &response)?;

            decode_json(ProviderId::Subscription, &response.body)
        })
    }

    fn billing_history<'a>(
        &'a self,
        subject: &'a SubjectId,
        budget: Duration,
    ) -> UpstreamFuture<'a, Vec<PaymentRecord>> {
        Box::pin(async move {
            reject_blank_subject(ProviderId::Billing, subject)?;

            let request = HttpRequest::get(self.url(ProviderId::Billing, "/api/billing/history"))
                .with_header(USER_HEADER, subject.as_str())
                .with_timeout(budget);
            let response = self.send(ProviderId::Billing, request).await?;
            check_status(ProviderId::Billing, &response)?;

            decode_json(ProviderId::Billing, &response.body)
        })
    }

    fn catalog<'a>(&'a self, budget: Duration) -> UpstreamFuture<'a, Vec<ContentSummary>> {
        Box::pin(async move {
            let request = HttpRequest::get(self.url(ProviderId::Catalog, "/api/contents"))
                .with_timeout(budget);
            let response = self.send(ProviderId::Catalog, request).await?;
            check_status(ProviderId::Catalog, &response)?;

            decode_json(ProviderId::Catalog, &response.body)
        })
    }
}
