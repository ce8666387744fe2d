use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use loanlens::workflows::lending::applications::{
    application_router, ApplicationRepository, LoanApplicationService, NotificationPublisher,
};

pub(crate) fn with_application_routes<R, N>(
    service: Arc<LoanApplicationService<R, N>>,
) -> axum::Router
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    application_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "loanlens" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{
        InMemoryAnalysisCache, InMemoryApplicationRepository, InMemoryAuditTrail, InMemoryNotifier,
        InMemoryPolicyStore,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use loanlens::config::AnalysisConfig;
    use loanlens::workflows::lending::analysis::ScoringConfig;
    use serde_json::Value;
    use tower::ServiceExt;

    fn build_router() -> axum::Router {
        let service = Arc::new(LoanApplicationService::new(
            Arc::new(InMemoryApplicationRepository::default()),
            Arc::new(InMemoryNotifier::default()),
            Arc::new(InMemoryAnalysisCache::default()),
            Arc::new(InMemoryAuditTrail::default()),
            Arc::new(InMemoryPolicyStore::default()),
            None,
            ScoringConfig::default(),
            AnalysisConfig::default(),
        ));
        with_application_routes(service)
    }

    #[tokio::test]
    async fn healthcheck_reports_service_name() {
        let response = build_router()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload["service"], "loanlens");
    }

    #[tokio::test]
    async fn application_routes_are_mounted() {
        let response = build_router()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/loans/applications")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
