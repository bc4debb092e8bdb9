//! Trigger and push hook handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use quarry_core::ports::TriggerPayload;
use quarry_trigger::{Admission, TriggerRequest};
use std::sync::Arc;
use tracing::error;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /api/hooks/{owner}/{name}`
///
/// Responds once the build is persisted or rejected. Dispatch carries on
/// in the background even if the client disconnects.
pub async fn trigger(
    State(state): State<Arc<AppState>>,
    Path((owner, name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = TriggerRequest {
        payload: TriggerPayload::trigger(owner, name, body.to_vec()),
        link: public_link(&state, &headers),
    };
    run(&state, request).await
}

/// `POST /api/hook`
///
/// Push webhook from the remote. The repository is taken from the body.
pub async fn push_hook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = TriggerRequest {
        payload: TriggerPayload::hook(body.to_vec()),
        link: public_link(&state, &headers),
    };
    run(&state, request).await
}

async fn run(state: &AppState, request: TriggerRequest) -> Response {
    match state.pipeline.spawn(request).await {
        Ok(Ok(Admission::Accepted(accepted))) => Json(accepted.build).into_response(),
        Ok(Ok(Admission::Skipped { reason })) => (StatusCode::OK, reason).into_response(),
        Ok(Err(e)) => ApiError(e).into_response(),
        Err(e) => {
            error!(error = %e, "Trigger task ended without a result");
            (StatusCode::INTERNAL_SERVER_ERROR, "Trigger failed").into_response()
        }
    }
}

/// Base URL executors and status links point at: the configured public URL,
/// else the scheme and host the request arrived on.
pub fn public_link(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.public_url {
        return url.clone();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}
