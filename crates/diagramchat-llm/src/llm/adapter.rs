//! The capability every upstream family implements.
//!
//! An adapter is a stateless translator: it knows the endpoint path, the
//! authentication headers, how to build a request body from canonical
//! messages, and how to read text back out of responses and stream frames.
//! It performs no I/O; [`super::client::LlmClient`] does the HTTP.
//!
//! Adding a provider means adding a [`Provider`] variant and an
//! implementation of this trait.  Nothing above this layer changes.

use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::config::{EffectiveConfig, Provider};
use crate::error::Result;
use crate::llm::types::Message;

/// One decoded upstream stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamDelta {
    /// An increment of assistant text.
    Text(String),
    /// The upstream signalled normal completion.
    Done,
    /// A frame that carries nothing for the caller.
    Skip,
}

/// Translation between canonical messages and one upstream's wire format.
pub trait ProviderAdapter: Send + Sync {
    /// The provider this adapter speaks for.
    fn provider(&self) -> Provider;

    /// Full URL of the chat endpoint under `base_url`.
    fn endpoint(&self, base_url: &str) -> String;

    /// Authentication and protocol headers for `api_key`.
    fn headers(&self, api_key: &str) -> Result<HeaderMap>;

    /// Build the JSON request body.
    fn build_body(&self, messages: &[Message], config: &EffectiveConfig, stream: bool) -> Value;

    /// Extract the answer text from a non-streaming response body.
    fn extract_text(&self, response: &Value) -> Result<String>;

    /// Decode the payload of a single `data:` stream line (prefix already
    /// stripped, never the `[DONE]` sentinel).
    fn parse_stream_data(&self, data: &str) -> Result<StreamDelta>;
}

/// Build the upstream request body for `config.provider`.
pub fn to_provider_payload(messages: &[Message], config: &EffectiveConfig, stream: bool) -> Value {
    config.provider.adapter().build_body(messages, config, stream)
}

/// Join a base URL and an endpoint path without doubling slashes.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(
            join_url("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            join_url("http://localhost:8080", "messages"),
            "http://localhost:8080/messages"
        );
    }

    #[test]
    fn provider_selects_matching_adapter() {
        for provider in [Provider::OpenAiCompatible, Provider::AnthropicCompatible] {
            assert_eq!(provider.adapter().provider(), provider);
        }
    }
}
