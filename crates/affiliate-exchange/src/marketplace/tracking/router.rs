use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tracing::{error, info};

use super::ledger::{ClickLedger, ClickMetadata};
use super::service::{TrackingError, TrackingService};
use crate::marketplace::applications::domain::ApplicationId;
use crate::marketplace::applications::repository::{ApplicationRepository, RepositoryError};
use crate::marketplace::offers::OfferCatalog;

/// Router exposing the redirect endpoint and per-link counters.
pub fn tracking_router<S>(service: Arc<TrackingService<S>>) -> Router
where
    S: ApplicationRepository + OfferCatalog + ClickLedger + 'static,
{
    Router::new()
        .route("/track/:short_code", get(redirect_handler::<S>))
        .route(
            "/api/applications/:application_id/stats",
            get(stats_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn redirect_handler<S>(
    State(service): State<Arc<TrackingService<S>>>,
    Path(short_code): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: ApplicationRepository + OfferCatalog + ClickLedger + 'static,
{
    match service.resolve(&short_code, click_metadata(&headers)) {
        Ok(resolved) => {
            info!(
                application_id = %resolved.application_id,
                short_code = %short_code,
                clicks = resolved.stats.click_count,
                "tracking link resolved"
            );
            (
                StatusCode::FOUND,
                [(header::LOCATION, resolved.destination_url)],
            )
                .into_response()
        }
        Err(err) => tracking_error_response(err),
    }
}

pub(crate) async fn stats_handler<S>(
    State(service): State<Arc<TrackingService<S>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ApplicationRepository + OfferCatalog + ClickLedger + 'static,
{
    match service.stats(&ApplicationId(application_id)) {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(err) => tracking_error_response(err),
    }
}

fn tracking_error_response(err: TrackingError) -> Response {
    let status = match &err {
        TrackingError::UnknownCode
        | TrackingError::OfferMissing
        | TrackingError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        TrackingError::LinkInactive { .. } => StatusCode::GONE,
        TrackingError::NotIssued { .. } => StatusCode::CONFLICT,
        TrackingError::Repository(other) => {
            error!(error = %other, "tracking lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}

fn click_metadata(headers: &HeaderMap) -> ClickMetadata {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let client_address = header_text("x-forwarded-for")
        .and_then(|forwarded| {
            forwarded
                .split(',')
                .next()
                .map(|first| first.trim().to_string())
        })
        .filter(|address| !address.is_empty())
        .or_else(|| header_text("x-real-ip"));

    ClickMetadata {
        client_address,
        user_agent: header_text(header::USER_AGENT.as_str()),
        referrer: header_text(header::REFERER.as_str()),
    }
}
