//! Provider-layer error types.
//!
//! All adapter, client and configuration failures surface through
//! [`LlmError`].  The web crate maps each variant onto an HTTP status; the
//! variants are therefore grouped by who is at fault.

use reqwest::StatusCode;

/// Unified error type for the provider layer.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    // -- Caller errors -------------------------------------------------------
    /// The inbound chat request is malformed.
    #[error("invalid request: {reason}")]
    ValidationError { reason: String },

    // -- Configuration errors ------------------------------------------------
    /// Neither the request nor the server defaults supply an API key.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    /// Neither the request nor the server defaults supply a model id.
    #[error("no model configured for provider: {provider}")]
    NoModelConfigured { provider: String },

    /// Configuration loading or parsing failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    // -- Upstream errors -----------------------------------------------------
    /// The HTTP request to the upstream could not be sent or read.
    #[error("llm request failed: {reason}")]
    RequestFailed { reason: String },

    /// The upstream answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    /// The upstream response could not be parsed into the expected shape.
    #[error("llm response parse error: {reason}")]
    ParseFailed { reason: String },

    /// The upstream stream broke after it started.
    #[error("llm stream error: {reason}")]
    StreamError { reason: String },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Whether the caller, rather than the server or upstream, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ValidationError { .. })
    }

    /// Whether the server is missing configuration it needs to dispatch.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey { .. } | Self::NoModelConfigured { .. } | Self::ConfigError { .. }
        )
    }
}

/// Convenience alias used throughout the provider crate.
pub type Result<T> = std::result::Result<T, LlmError>;

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed {
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for LlmError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            reason: err.to_string(),
        }
    }
}
