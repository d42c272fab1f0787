//! HTTP route handlers

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, VARY,
};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::HandlerState;
use crate::error::Error;
use crate::ingest::prepare_batch;

#[derive(Serialize)]
struct TrackResponse {
    status: &'static str,
    data: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// POST /track - Ingest a batch of events
pub async fn track(
    State(state): State<Arc<HandlerState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    // Body rejections (e.g. over the size limit) still need CORS headers
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(status = %rejection.status(), "Rejected request body");
            let response = error_response(rejection.status(), rejection.body_text());
            return with_cors(&state, response);
        }
    };

    let decoded = std::str::from_utf8(&body)
        .map_err(|e| Error::Validation(format!("body is not valid UTF-8: {}", e)))
        .and_then(prepare_batch);

    let events = match decoded {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "Rejected event batch");
            let response = error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
            return with_cors(&state, response);
        }
    };

    // Storage problems are logged, not reported to the agent
    if !events.is_empty() {
        let sink = Arc::clone(&state.sink);
        match tokio::task::spawn_blocking(move || sink.insert_events(&events)).await {
            Ok(Ok(stored)) => tracing::info!(events = stored, "Events stored"),
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to store events"),
            Err(e) => tracing::error!(error = %e, "Storage task failed"),
        }
    }

    let response = (
        StatusCode::OK,
        Json(TrackResponse {
            status: "success",
            data: "Events received",
        }),
    );
    with_cors(&state, response.into_response())
}

/// OPTIONS /track - CORS preflight
pub async fn preflight(State(state): State<Arc<HandlerState>>) -> Response {
    with_cors(&state, StatusCode::NO_CONTENT.into_response())
}

/// GET /health - Health check
pub async fn health_check() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

/// Fallback for unknown routes
pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not Found".to_string())
}

fn with_cors(state: &HandlerState, mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, state.allowed_origin.clone());
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(VARY, HeaderValue::from_static("Origin"));
    response
}
