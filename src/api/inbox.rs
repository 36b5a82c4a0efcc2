//! ActivityPub inbox endpoints
//!
//! - POST /:site_id/inbox - Receive an activity
//! - GET /:site_id/inbox - Activities collection

use axum::body::Bytes;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::AppState;
use crate::error::AppError;
use crate::federation::Activity;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};

const ACTIVITY_JSON: &str = "application/activity+json";

/// Create inbox router
pub fn inbox_router() -> Router<AppState> {
    Router::new().route("/:site_id/inbox", get(get_activities).post(post_activity))
}

/// POST /:site_id/inbox
///
/// Parses the body as an activity and hands it to the inbox service.
/// Returns 202 once the activity was accepted.
async fn post_activity(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/:site_id/inbox"])
        .start_timer();

    let result = receive(&state, site_id, &body).await;
    record_request("POST", &result.as_ref().map(|_| StatusCode::ACCEPTED));
    result.map(|()| StatusCode::ACCEPTED)
}

async fn receive(state: &AppState, site_id: String, body: &[u8]) -> Result<(), AppError> {
    let activity: Activity = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidActivity(format!("malformed activity JSON: {e}")))?;

    tracing::debug!(site_id = %site_id, "Received activity");

    state.inbox.spawn_handle_activity(site_id, activity).await
}

/// GET /:site_id/inbox
///
/// Content-Type: application/activity+json
async fn get_activities(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> Result<Response, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/:site_id/inbox"])
        .start_timer();

    let result = state.inbox.spawn_get_activities(site_id).await;
    record_request("GET", &result.as_ref().map(|_| StatusCode::OK));

    let collection = result?;
    Ok(([(header::CONTENT_TYPE, ACTIVITY_JSON)], Json(collection)).into_response())
}

fn record_request(method: &str, outcome: &Result<StatusCode, &AppError>) {
    let status = match outcome {
        Ok(status) => *status,
        Err(error) => error.status_code(),
    };

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, "/:site_id/inbox", status.as_str()])
        .inc();
}
