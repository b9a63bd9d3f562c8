//! Error type for the HTTP layer.
//!
//! Every failure is rendered as `{"error": "<message>"}` with a status code
//! chosen by who is at fault.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use diagramchat_llm::LlmError;

/// Errors returned by the gateway handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body is malformed.
    #[error("{0}")]
    Client(String),

    /// The access gate refused the request.
    #[error("{0}")]
    Auth(String),

    /// Configuration, transport or upstream failure.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Client(_) => StatusCode::BAD_REQUEST,
            Self::Llm(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Llm(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "chat request failed");
        } else {
            tracing::debug!(%status, error = %self, "chat request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_by_fault() {
        assert_eq!(ApiError::Client("bad".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Auth("no".into()).status(), StatusCode::UNAUTHORIZED);

        let validation = ApiError::from(LlmError::ValidationError {
            reason: "empty".into(),
        });
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);

        let missing = ApiError::from(LlmError::MissingApiKey {
            provider: "openai-compatible".into(),
        });
        assert_eq!(missing.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_message_includes_status_and_body() {
        let err = ApiError::from(LlmError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            body: "overloaded".into(),
        });
        let message = err.to_string();
        assert!(message.contains("502"));
        assert!(message.contains("overloaded"));
    }
}
