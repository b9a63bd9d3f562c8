//! REST API route handlers.
//!
//! Provides the chat dispatcher and the status endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use diagramchat_llm::{ChatRequest, ChatResponse, EffectiveConfig, Provider, normalize};

use crate::auth::{AccessDecision, PASSWORD_HEADER, authorize};
use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response payload for the `/api/status` endpoint.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub provider: Provider,
    pub model: Option<String>,
    pub has_default_key: bool,
    pub password_required: bool,
}

/// Report liveness and which defaults are configured, never their values.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let defaults = &state.defaults;

    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        provider: defaults.effective_provider(),
        model: defaults.model_id.clone(),
        has_default_key: defaults.has_api_key(),
        password_required: defaults.password().is_some(),
    })
}

// ---------------------------------------------------------------------------
// POST /chat
// ---------------------------------------------------------------------------

/// Dispatch a chat request to the effective provider.
///
/// The body is taken as raw bytes so that a missing or wrong content type
/// and malformed JSON are all reported the same way, as a 400 with an
/// `error` message.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = parse_chat_request(&body)?;

    let supplied = headers
        .get(PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok());
    let decision = authorize(
        supplied,
        state.defaults.password(),
        request.usable_override().is_some(),
    );
    if let AccessDecision::Deny(reason) = decision {
        return Err(ApiError::Auth(reason));
    }

    let config = EffectiveConfig::resolve(&state.defaults, request.usable_override())?;

    tracing::info!(
        provider = %config.provider,
        model = %config.model_id,
        messages = request.messages.len(),
        stream = request.stream,
        byok = request.usable_override().is_some(),
        "dispatching chat request"
    );

    if !request.stream {
        let content = state.llm.call(&request.messages, &config).await?;
        return Ok(Json(ChatResponse { content }).into_response());
    }

    let upstream = state.llm.open_stream(&request.messages, &config).await?;
    let body = Body::from_stream(normalize(config.provider, upstream));

    Ok((
        [(CONTENT_TYPE, "text/event-stream"), (CACHE_CONTROL, "no-cache")],
        body,
    )
        .into_response())
}

/// Parse and validate the inbound body.
fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::Client(format!("request body is not valid JSON: {e}")))?;

    match value.get("messages") {
        Some(Value::Array(_)) => {}
        Some(_) => return Err(ApiError::Client("`messages` must be an array".into())),
        None => return Err(ApiError::Client("`messages` is required".into())),
    }

    let request: ChatRequest = serde_json::from_value(value)
        .map_err(|e| ApiError::Client(format!("invalid chat request: {e}")))?;
    request.validate()?;

    Ok(request)
}
