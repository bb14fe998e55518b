//! Wire contract of the HTTP-based transports, checked against a recording
//! fake client.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use switchyard_core::transport::{HttpError, HttpFuture, HttpMethod, HttpRequest, HttpResponse};
use switchyard_core::{
    GraphQlSource, HttpClient, ProviderEndpoints, ProviderErrorKind, RestSource, SubjectId,
    UpstreamSource,
};

const BUDGET: Duration = Duration::from_millis(250);

type Reply = Result<HttpResponse, HttpError>;

/// Answers every request with the first reply whose URL fragment matches, and
/// records what it was asked.
#[derive(Default)]
struct RecordingClient {
    replies: Vec<(&'static str, Reply)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingClient {
    fn reply(mut self, url_fragment: &'static str, reply: Reply) -> Self {
        self.replies.push((url_fragment, reply));
        self
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl HttpClient for RecordingClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let reply = self
            .replies
            .iter()
            .find(|(fragment, _)| request.url.contains(fragment))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Ok(HttpResponse::new(500, "unexpected request")));
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        Box::pin(async move { reply })
    }
}

fn endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        profiles: String::from("http://profiles.test/"),
        subscription: String::from("http://subscriptions.test"),
        billing: String::from("http://billing.test"),
        catalog: String::from("http://catalog.test"),
    }
}

fn rest(client: RecordingClient) -> (Arc<RecordingClient>, RestSource) {
    let client = Arc::new(client);
    let source = RestSource::new(client.clone(), endpoints());
    (client, source)
}

fn graphql(client: RecordingClient) -> (Arc<RecordingClient>, GraphQlSource) {
    let client = Arc::new(client);
    let source = GraphQlSource::new(client.clone(), endpoints());
    (client, source)
}

#[tokio::test]
async fn rest_profiles_hits_account_path_with_encoded_subject() {
    // Given a profile service listing two profiles
    let (client, source) = rest(RecordingClient::default().reply(
        "/api/profiles/account/",
        Ok(HttpResponse::ok_json(
            r#"[{"id":1,"profileName":"Main","avatarUrl":null,"isChildProfile":false},
                {"id":2,"profileName":"Kids","isChildProfile":true}]"#,
        )),
    ));

    // When profiles are fetched for a subject needing escaping
    let profiles = source
        .profiles(&SubjectId::from("acct 42"), BUDGET)
        .await
        .expect("profiles");

    // Then the request path and budget follow the contract
    assert_eq!(profiles.len(), 2);
    assert!(profiles[1].is_child_profile);
    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert_eq!(
        requests[0].url,
        "http://profiles.test/api/profiles/account/acct%2042"
    );
    assert_eq!(requests[0].timeout, BUDGET);
}

#[tokio::test]
async fn rest_subscription_sends_user_header_and_folds_plan_name() {
    let (client, source) = rest(RecordingClient::default().reply(
        "/api/subscription/my-subscription",
        Ok(HttpResponse::ok_json(
            r#"{"id":77,"status":"ACTIVE","billingCycle":"YEARLY","plan":{"planName":"Family","price":99.0}}"#,
        )),
    ));

    let subscription = source
        .subscription(&SubjectId::from("acct-42"), BUDGET)
        .await
        .expect("subscription call")
        .expect("active subscription");

    assert_eq!(subscription.id, 77);
    assert_eq!(
        subscription.plan.map(|plan| plan.plan_name),
        Some(String::from("Family"))
    );
    let requests = client.requests();
    assert_eq!(
        requests[0].headers.get("x-user-id").map(String::as_str),
        Some("acct-42")
    );
}

#[tokio::test]
async fn rest_missing_subscription_is_absent_not_failed() {
    for reply in [HttpResponse::new(404, "not found"), HttpResponse::ok_json("  ")] {
        let (_, source) = rest(
            RecordingClient::default()
                .reply("/api/subscription/", Ok(reply)),
        );

        let subscription = source
            .subscription(&SubjectId::from("acct-42"), BUDGET)
            .await
            .expect("absent subscription is not an error");

        assert_eq!(subscription, None);
    }
}

#[tokio::test]
async fn rest_failures_are_normalized() {
    // Given billing returning 503, catalog returning garbage and profiles timing out
    let (_, source) = rest(
        RecordingClient::default()
            .reply("/api/billing/history", Ok(HttpResponse::new(503, "busy")))
            .reply("/api/contents", Ok(HttpResponse::ok_json("{not json")))
            .reply("/api/profiles/", Err(HttpError::timeout("deadline"))),
    );
    let subject = SubjectId::from("acct-42");

    // Then each failure maps onto its provider error kind
    let billing = source.billing_history(&subject, BUDGET).await;
    assert_eq!(
        billing.map_err(|error| error.kind()),
        Err(ProviderErrorKind::Unavailable)
    );

    let catalog = source.catalog(BUDGET).await;
    assert_eq!(
        catalog.map_err(|error| error.kind()),
        Err(ProviderErrorKind::Decode)
    );

    let profiles = source.profiles(&subject, BUDGET).await;
    assert_eq!(
        profiles.map_err(|error| error.kind()),
        Err(ProviderErrorKind::Timeout)
    );
}

#[tokio::test]
async fn rest_bad_request_is_invalid_request() {
    let (_, source) = rest(
        RecordingClient::default()
            .reply("/api/billing/", Ok(HttpResponse::new(400, "bad"))),
    );

    let result = source
        .billing_history(&SubjectId::from("acct-42"), BUDGET)
        .await;

    assert_eq!(
        result.map_err(|error| error.kind()),
        Err(ProviderErrorKind::InvalidRequest)
    );
}

#[tokio::test]
async fn blank_subject_is_rejected_before_any_request() {
    let (client, source) = rest(RecordingClient::default());

    let result = source.profiles(&SubjectId::from("   "), BUDGET).await;

    assert_eq!(
        result.map_err(|error| error.kind()),
        Err(ProviderErrorKind::InvalidRequest)
    );
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn graphql_posts_query_with_variables() {
    // Given a gateway answering the billing query with string ids
    let (client, source) = graphql(RecordingClient::default().reply(
        "billing.test/graphql",
        Ok(HttpResponse::ok_json(
            r#"{"data":{"getBillingHistory":[
                {"id":"11","amount":9.5,"status":"COMPLETED","paymentDate":"2026-09-01"}]}}"#,
        )),
    ));

    // When billing history is fetched
    let payments = source
        .billing_history(&SubjectId::from("acct-42"), BUDGET)
        .await
        .expect("payments");

    // Then the body carries the query document and subject variable
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].id, 11);
    assert_eq!(payments[0].payment_status, "COMPLETED");

    let requests = client.requests();
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].url, "http://billing.test/graphql");
    let raw = requests[0].body.as_deref().unwrap_or_default();
    let body: serde_json::Value = serde_json::from_str(raw).expect("json body");
    assert!(body["query"]
        .as_str()
        .is_some_and(|query| query.contains("getBillingHistory")));
    assert_eq!(body["variables"]["userId"], "acct-42");
}

#[tokio::test]
async fn graphql_errors_array_fails_the_call() {
    let (_, source) = graphql(RecordingClient::default().reply(
        "/graphql",
        Ok(HttpResponse::ok_json(
            r#"{"data":null,"errors":[{"message":"resolver exploded"}]}"#,
        )),
    ));

    let result = source.profiles(&SubjectId::from("acct-42"), BUDGET).await;

    let error = result.expect_err("errors array is a failure");
    assert_eq!(error.kind(), ProviderErrorKind::Unavailable);
    assert!(error.message().contains("resolver exploded"));
}

#[tokio::test]
async fn graphql_missing_field_is_decode_and_null_subscription_is_absent() {
    let (_, source) = graphql(
        RecordingClient::default()
            .reply(
                "subscriptions.test",
                Ok(HttpResponse::ok_json(r#"{"data":{"getActiveSubscription":null}}"#)),
            )
            .reply("catalog.test", Ok(HttpResponse::ok_json(r#"{"data":{}}"#))),
    );

    let subscription = source
        .subscription(&SubjectId::from("acct-42"), BUDGET)
        .await
        .expect("null subscription is absent");
    assert_eq!(subscription, None);

    let catalog = source.catalog(BUDGET).await;
    assert_eq!(
        catalog.map_err(|error| error.kind()),
        Err(ProviderErrorKind::Decode)
    );
}
