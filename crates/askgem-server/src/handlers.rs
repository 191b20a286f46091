//! HTTP route handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::{HeaderMap, Method};
use tracing::Instrument;
use uuid::Uuid;

use crate::adapter::AskHandler;
use crate::envelope::{HttpRequestEnvelope, HttpResponseEnvelope};
use crate::AppState;

/// `/api/ask`: answered by the agent.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> HttpResponseEnvelope {
    dispatch(&state.ask, method, &headers, body).await
}

/// `/api/index`: answered by a direct model call.
pub async fn index(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> HttpResponseEnvelope {
    dispatch(&state.index, method, &headers, body).await
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

async fn dispatch(
    handler: &AskHandler,
    method: Method,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> HttpResponseEnvelope {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("ask", %request_id, route = handler.variant().route());

    // Body rejections still go through the adapter so they get CORS headers.
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            return span.in_scope(|| {
                handler.reject_body(method.as_str(), rejection.status().as_u16(), rejection.body_text())
            })
        }
    };

    let request = HttpRequestEnvelope::from_parts(method.as_str(), headers, body.to_vec());
    handler.handle(request).instrument(span).await
}
