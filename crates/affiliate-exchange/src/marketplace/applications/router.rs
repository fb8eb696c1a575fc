use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{Application, ApplicationId, ApplicationSubmission};
use super::repository::{ApplicationRepository, RepositoryError};
use super::service::{ApplicationService, ApplicationServiceError};
use crate::marketplace::offers::CreatorId;

/// Router exposing submission, lookup, and manual status changes.
pub fn application_router<R>(service: Arc<ApplicationService<R>>) -> Router
where
    R: ApplicationRepository + 'static,
{
    Router::new()
        .route("/api/applications", post(submit_handler::<R>))
        .route(
            "/api/applications/:application_id",
            get(status_handler::<R>),
        )
        .route(
            "/api/applications/:application_id/reject",
            post(reject_handler::<R>),
        )
        .route(
            "/api/applications/:application_id/activate",
            post(activate_handler::<R>),
        )
        .route(
            "/api/applications/:application_id/complete",
            post(complete_handler::<R>),
        )
        .route(
            "/api/creators/me/applications",
            get(creator_applications_handler::<R>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatorQuery {
    creator_id: Option<String>,
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<ApplicationService<R>>>,
    body: Result<axum::Json<ApplicationSubmission>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let submission = match body {
        Ok(axum::Json(submission)) => submission,
        Err(rejection) => {
            let payload = json!({
                "error": "invalid request body",
                "details": rejection.body_text(),
            });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };

    match service.submit(submission) {
        Ok(application) => (StatusCode::OK, axum::Json(application.view())).into_response(),
        Err(ApplicationServiceError::Validation(validation)) => {
            let payload = json!({
                "error": "invalid application",
                "details": validation.details,
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Err(ApplicationServiceError::Repository(RepositoryError::MissingReference {
            entity,
            id,
        })) => {
            let payload = json!({
                "error": format!("unknown {entity}"),
                "details": [{
                    "field": format!("{entity}Id"),
                    "message": format!("{entity} '{id}' does not exist"),
                }],
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

pub(crate) async fn status_handler<R>(
    State(service): State<Arc<ApplicationService<R>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let id = ApplicationId(application_id);
    match service.get(&id) {
        Ok(application) => (StatusCode::OK, axum::Json(application.view())).into_response(),
        Err(err) => transition_error(&id, err),
    }
}

pub(crate) async fn creator_applications_handler<R>(
    State(service): State<Arc<ApplicationService<R>>>,
    Query(query): Query<CreatorQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let Some(creator_id) = query
        .creator_id
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
    else {
        let payload = json!({
            "error": "creatorId query parameter is required",
        });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };

    match service.list_for_creator(&CreatorId(creator_id)) {
        Ok(applications) => {
            let views: Vec<_> = applications.iter().map(|app| app.view()).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

pub(crate) async fn reject_handler<R>(
    State(service): State<Arc<ApplicationService<R>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let id = ApplicationId(application_id);
    respond_with_transition(&id, service.reject(&id))
}

pub(crate) async fn activate_handler<R>(
    State(service): State<Arc<ApplicationService<R>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let id = ApplicationId(application_id);
    respond_with_transition(&id, service.activate(&id))
}

pub(crate) async fn complete_handler<R>(
    State(service): State<Arc<ApplicationService<R>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let id = ApplicationId(application_id);
    respond_with_transition(&id, service.complete(&id))
}

fn respond_with_transition(
    id: &ApplicationId,
    result: Result<Application, ApplicationServiceError>,
) -> Response {
    match result {
        Ok(application) => (StatusCode::OK, axum::Json(application.view())).into_response(),
        Err(err) => transition_error(id, err),
    }
}

fn transition_error(id: &ApplicationId, err: ApplicationServiceError) -> Response {
    match err {
        ApplicationServiceError::Repository(RepositoryError::NotFound) => {
            let payload = json!({
                "error": "application not found",
                "applicationId": id.0,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        ApplicationServiceError::InvalidTransition { from, to } => {
            let payload = json!({
                "error": format!("cannot move application from {from} to {to}"),
                "status": from.label(),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        other => internal_error(other),
    }
}

fn internal_error(err: ApplicationServiceError) -> Response {
    error!(error = %err, "application request failed");
    let payload = json!({
        "error": err.to_string(),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
