//! Inbound HTTP surface.
//!
//! - `GET /api/users/analytics/dashboard/{userId}`: aggregated dashboard, or
//!   404 with `{code, message}` for an unknown subject
//! - `GET /api/users/analytics/health`: liveness
//! - `GET /api/users/analytics/metrics`: process-wide provider statistics
//!
//! Dropping a handler future (client disconnect) aborts the provider tasks
//! it still owns.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use switchyard_core::{AggregateError, Aggregator, MetricsSnapshot, SubjectId};
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

type AppState = Arc<Aggregator>;

pub fn router(aggregator: Arc<Aggregator>) -> Router {
    Router::new()
        .route("/api/users/analytics/dashboard/:user_id", get(dashboard))
        .route("/api/users/analytics/health", get(health))
        .route("/api/users/analytics/metrics", get(metrics))
        .with_state(aggregator)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

async fn dashboard(State(aggregator): State<AppState>, Path(user_id): Path<String>) -> Response {
    let request_id = Uuid::new_v4();
    let subject = SubjectId::new(user_id);
    let span = info_span!("dashboard", %request_id, subject = %subject);

    match aggregator.dashboard(&subject).instrument(span).await {
        Ok(dashboard) => Json(dashboard).into_response(),
        Err(error) => {
            let status = match &error {
                AggregateError::SubjectNotFound(_) => StatusCode::NOT_FOUND,
                AggregateError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            };
            warn!(%request_id, code = error.code(), "dashboard request failed");
            let body = ErrorBody {
                code: error.code(),
                message: error.to_string(),
            };
            (status, Json(body)).into_response()
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn metrics(State(aggregator): State<AppState>) -> Json<MetricsSnapshot> {
    Json(aggregator.metrics().snapshot())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use switchyard_core::{AggregatorConfig, OutboundPool, PoolSettings};
    use tokio::runtime::Handle;
    use tower::ServiceExt;

    use super::router;

    fn mock_router() -> axum::Router {
        let config = AggregatorConfig::default().with_mock_transport();
        let pool = OutboundPool::on_handle(Handle::current(), PoolSettings::default())
            .expect("valid pool settings");
        let aggregator = config
            .build_with_pool(Arc::new(pool))
            .expect("mock aggregator");
        router(Arc::new(aggregator))
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("infallible router");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn known_subject_returns_full_dashboard() {
        // Given a router over scripted upstreams
        let app = mock_router();

        // When the dashboard of a known subject is requested
        let (status, body) = get_json(app, "/api/users/analytics/dashboard/acct-42")
            .await;

        // Then every section is present with ok latency entries
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["userId"], "acct-42");
        assert_eq!(body["profiles"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["recentPayments"].as_array().map(Vec::len), Some(5));
        assert_eq!(body["watchHistory"]["totalWatched"], 42);
        assert_eq!(body["latency"]["providers"]["catalog"]["status"], "ok");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_subject_is_not_found() {
        let app = mock_router();

        let (status, body) = get_json(app, "/api/users/analytics/dashboard/nobody").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "subject.not_found");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn metrics_count_served_requests() {
        // Given one served and one rejected request
        let app = mock_router();
        let _ = get_json(app.clone(), "/api/users/analytics/dashboard/acct-7")
            .await;
        let _ = get_json(app.clone(), "/api/users/analytics/dashboard/nobody")
            .await;

        // When metrics are read
        let (status, body) = get_json(app, "/api/users/analytics/metrics").await;

        // Then both are accounted for
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["aggregates"], 1);
        assert_eq!(body["subjectsNotFound"], 1);
        assert_eq!(body["providers"]["profiles"]["calls"], 1);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = mock_router()
            .oneshot(
                Request::builder()
                    .uri("/api/users/analytics/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("infallible router");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
