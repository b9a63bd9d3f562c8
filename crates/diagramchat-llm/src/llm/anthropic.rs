//! Adapter for the Anthropic Messages API.
//!
//! Anthropic differs from the Chat Completions shape in three ways that
//! matter here:
//!
//! - the system prompt is a top-level `system` field, not a message;
//! - images must be sent inline as base64 blocks;
//! - the stream is a sequence of typed events where only
//!   `content_block_delta` carries text.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::config::{EffectiveConfig, Provider};
use crate::error::{LlmError, Result};
use crate::llm::adapter::{ProviderAdapter, StreamDelta, join_url};
use crate::llm::types::{ContentPart, Message, MessageContent, Role, parse_data_url};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Stateless Anthropic-compatible adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicAdapter;

impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::AnthropicCompatible
    }

    fn endpoint(&self, base_url: &str) -> String {
        join_url(base_url, "messages")
    }

    fn headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|e| LlmError::ConfigError {
                reason: format!("invalid API key header: {e}"),
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_body(&self, messages: &[Message], config: &EffectiveConfig, stream: bool) -> Value {
        let (system, wire_messages) = messages_to_anthropic(messages);

        json!({
            "model": config.model_id,
            "max_tokens": config.max_tokens,
            "system": system,
            "messages": wire_messages,
            "stream": stream,
        })
    }

    fn extract_text(&self, response: &Value) -> Result<String> {
        parse_anthropic_response(response)
    }

    fn parse_stream_data(&self, data: &str) -> Result<StreamDelta> {
        let v: Value = serde_json::from_str(data).map_err(|e| LlmError::ParseFailed {
            reason: format!("invalid JSON in Anthropic SSE data: {e}"),
        })?;

        match v["type"].as_str() {
            Some("content_block_delta") => match v["delta"]["text"].as_str() {
                Some(text) if !text.is_empty() => Ok(StreamDelta::Text(text.to_owned())),
                // input_json_delta and friends carry no user-visible text.
                _ => Ok(StreamDelta::Skip),
            },
            // Anthropic has no `[DONE]` line; this is its end-of-stream marker.
            Some("message_stop") => Ok(StreamDelta::Done),
            other => {
                tracing::trace!(event_type = ?other, "ignoring Anthropic stream event");
                Ok(StreamDelta::Skip)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Format conversion
// ---------------------------------------------------------------------------

/// Split the system prompt out of `messages` and convert the rest.
///
/// Only the first system message is honored; any later ones are dropped
/// without error.  When there is none the system text is empty.
pub fn messages_to_anthropic(messages: &[Message]) -> (String, Vec<Value>) {
    let mut system: Option<String> = None;
    let mut wire_messages: Vec<Value> = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => {
                if system.is_none() {
                    system = Some(msg.text());
                } else {
                    tracing::debug!("dropping extra system message");
                }
            }
            Role::User | Role::Assistant => {
                let role = if msg.role == Role::User {
                    "user"
                } else {
                    "assistant"
                };
                wire_messages.push(json!({
                    "role": role,
                    "content": content_to_anthropic(&msg.content),
                }));
            }
        }
    }

    (system.unwrap_or_default(), wire_messages)
}

/// Convert message content into Anthropic content blocks.
///
/// Data-URL images become inline base64 blocks.  Other image URLs cannot be
/// inlined without fetching them, so they degrade to a text block that
/// carries the literal URL.
pub fn content_to_anthropic(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => json!(text),
        MessageContent::Parts(parts) => {
            let blocks: Vec<Value> = parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(json!({"type": "text", "text": text})),
                    ContentPart::ImageUrl { image_url } => Some(match parse_data_url(&image_url.url) {
                        Some(image) => json!({
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": image.media_type,
                                "data": image.data,
                            },
                        }),
                        None => json!({
                            "type": "text",
                            "text": format!("[image: {}]", image_url.url),
                        }),
                    }),
                    ContentPart::Unknown => None,
                })
                .collect();
            json!(blocks)
        }
    }
}

/// Extract `content[0].text` from a non-streaming response.
pub fn parse_anthropic_response(v: &Value) -> Result<String> {
    let first = v["content"]
        .as_array()
        .and_then(|blocks| blocks.first())
        .ok_or_else(|| LlmError::ParseFailed {
            reason: "missing `content[0]` in response".into(),
        })?;

    Ok(first["text"].as_str().unwrap_or_default().to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
