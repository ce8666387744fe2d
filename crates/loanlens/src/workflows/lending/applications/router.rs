use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{ApplicationId, ApplicationSubmission};
use super::policy::RiskPolicy;
use super::repository::{ApplicationRepository, NotificationPublisher, RepositoryError};
use super::service::{LoanApplicationService, NavigateDirection, ServiceError, VerifyCommand};

/// Router builder exposing the loan screening REST surface.
pub fn application_router<R, N>(service: Arc<LoanApplicationService<R, N>>) -> Router
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/loans/applications",
            get(list_handler::<R, N>).post(submit_handler::<R, N>),
        )
        .route(
            "/api/v1/loans/applications/batch",
            post(batch_handler::<R, N>),
        )
        .route(
            "/api/v1/loans/applications/stats",
            get(stats_handler::<R, N>),
        )
        .route(
            "/api/v1/loans/applications/:application_id",
            get(get_handler::<R, N>).delete(delete_handler::<R, N>),
        )
        .route(
            "/api/v1/loans/applications/:application_id/status",
            get(status_handler::<R, N>),
        )
        .route(
            "/api/v1/loans/applications/:application_id/reasoning",
            get(reasoning_handler::<R, N>),
        )
        .route(
            "/api/v1/loans/applications/:application_id/navigate",
            get(navigate_handler::<R, N>),
        )
        .route(
            "/api/v1/loans/applications/:application_id/verify",
            post(verify_handler::<R, N>),
        )
        .route(
            "/api/v1/loans/applications/:application_id/retry",
            post(retry_handler::<R, N>),
        )
        .route(
            "/api/v1/loans/policy",
            get(policy_get_handler::<R, N>).put(policy_put_handler::<R, N>),
        )
        .with_state(service)
}

fn error_response(error: ServiceError) -> Response {
    let status = match &error {
        ServiceError::Intake(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ServiceError::InvalidState { .. } => StatusCode::BAD_REQUEST,
        ServiceError::Analysis(_) | ServiceError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

/// Runs the analysis pipeline for an application on a blocking task; the
/// pipeline may sleep between analyst retries.
fn spawn_processing<R, N>(service: Arc<LoanApplicationService<R, N>>, id: ApplicationId)
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    tokio::task::spawn_blocking(move || {
        if let Err(err) = service.process(&id) {
            warn!(application_id = %id.0, %err, "background processing failed");
        }
    });
}

pub(crate) async fn submit_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    axum::Json(submission): axum::Json<ApplicationSubmission>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.submit(submission) {
        Ok(record) => {
            spawn_processing(service, record.application_id.clone());
            (StatusCode::ACCEPTED, axum::Json(record.summary_view())).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

pub(crate) async fn list_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    Query(params): Query<ListParams>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.list(params.limit) {
        Ok(records) => {
            let views: Vec<_> = records
                .iter()
                .map(|record| record.summary_view())
                .collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn batch_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    body: String,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.submit_batch(&body) {
        Ok(ids) => {
            for id in &ids {
                spawn_processing(service.clone(), id.clone());
            }
            let payload = json!({
                "processed_count": ids.len(),
                "application_ids": ids,
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.delete(&ApplicationId(application_id), "admin") {
        Ok(()) => {
            let payload = json!({ "success": true });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reasoning_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.reasoning(&ApplicationId(application_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NavigateParams {
    #[serde(default = "default_direction")]
    direction: NavigateDirection,
}

fn default_direction() -> NavigateDirection {
    NavigateDirection::Next
}

pub(crate) async fn navigate_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    Path(application_id): Path<String>,
    Query(params): Query<NavigateParams>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.navigate(&ApplicationId(application_id), params.direction) {
        Ok(neighbor) => {
            let payload = json!({ "application_id": neighbor.map(|id| id.0) });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn verify_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    Path(application_id): Path<String>,
    axum::Json(command): axum::Json<VerifyCommand>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.verify(&ApplicationId(application_id), command) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn retry_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let id = ApplicationId(application_id);
    match service.retry(&id) {
        Ok(()) => {
            spawn_processing(service, id);
            let payload = json!({ "success": true, "status": "Processing" });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn stats_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.stats() {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn policy_get_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    (StatusCode::OK, axum::Json(service.policy())).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct PolicyUpdateRequest {
    #[serde(flatten)]
    policy: RiskPolicy,
    #[serde(default)]
    actor: Option<String>,
}

pub(crate) async fn policy_put_handler<R, N>(
    State(service): State<Arc<LoanApplicationService<R, N>>>,
    axum::Json(request): axum::Json<PolicyUpdateRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = request.actor.unwrap_or_else(|| "admin".to_string());
    match service.update_policy(request.policy, &actor) {
        Ok(policy) => (StatusCode::OK, axum::Json(policy)).into_response(),
        Err(error) => error_response(error),
    }
}
