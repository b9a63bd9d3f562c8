//! HTTP client for the upstream chat endpoints.
//!
//! [`LlmClient`] is provider-agnostic: every request goes through the
//! [`ProviderAdapter`] selected by the request's [`EffectiveConfig`], which
//! supplies URL, headers, body and response extraction.  The client only
//! owns the connection pool and the status/body handling shared by both
//! operations.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::config::EffectiveConfig;
use crate::error::{LlmError, Result};
use crate::llm::adapter::ProviderAdapter;
use crate::llm::types::Message;

/// Connect timeout applied to every upstream request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw upstream response body, as handed to the stream normalizer.
pub type ByteStream = BoxStream<'static, reqwest::Result<Bytes>>;

/// Upstream HTTP client.  Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    /// Whole-request timeout for non-streaming calls.  Streams are not
    /// bounded, since a long answer is not a failure.
    call_timeout: Duration,
}

impl LlmClient {
    /// Create a new client.
    pub fn new(call_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, call_timeout })
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Send a non-streaming request and return the answer text.
    pub async fn call(&self, messages: &[Message], config: &EffectiveConfig) -> Result<String> {
        let adapter = config.provider.adapter();
        let body = adapter.build_body(messages, config, false);
        let resp = self.send(adapter, config, &body, Some(self.call_timeout)).await?;

        let text = resp.text().await.map_err(|e| LlmError::RequestFailed {
            reason: format!("failed to read response body: {e}"),
        })?;

        let v: Value = serde_json::from_str(&text).map_err(|e| LlmError::ParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        adapter.extract_text(&v)
    }

    /// Send a streaming request and return the raw response body.
    ///
    /// All failures (missing key, transport error, non-2xx status) are
    /// reported here, before the first byte reaches the caller.
    pub async fn open_stream(
        &self,
        messages: &[Message],
        config: &EffectiveConfig,
    ) -> Result<ByteStream> {
        let adapter = config.provider.adapter();
        let body = adapter.build_body(messages, config, true);
        let resp = self.send(adapter, config, &body, None).await?;

        Ok(resp.bytes_stream().boxed())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Post `body` to the adapter's endpoint and reject non-2xx responses.
    async fn send(
        &self,
        adapter: &dyn ProviderAdapter,
        config: &EffectiveConfig,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey {
                provider: config.provider.to_string(),
            });
        }

        let url = adapter.endpoint(&config.base_url);
        let headers = adapter.headers(&config.api_key)?;

        tracing::debug!(
            url = %url,
            model = %config.model_id,
            provider = %config.provider,
            stream = body["stream"].as_bool().unwrap_or(false),
            "sending LLM request"
        );

        let mut request = self.http.post(&url).headers(headers).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let resp = request.send().await.map_err(|e| LlmError::RequestFailed {
            reason: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, provider = %config.provider, "upstream returned error status");
            return Err(LlmError::Upstream { status, body: text });
        }

        Ok(resp)
    }
}
