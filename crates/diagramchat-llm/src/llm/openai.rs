//! Adapter for the OpenAI Chat Completions API.
//!
//! Covers OpenAI itself and the many endpoints that mimic it (Ollama,
//! vLLM, OpenRouter, DeepSeek, ...).  System messages stay in the
//! `messages` array and image parts are forwarded as `image_url` references,
//! so no content is lost in translation.
//!
//! Streaming frames are `data: <json>` lines whose text increment lives at
//! `choices[0].delta.content`; the stream ends with `data: [DONE]`.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::config::{EffectiveConfig, Provider};
use crate::error::{LlmError, Result};
use crate::llm::adapter::{ProviderAdapter, StreamDelta, join_url};
use crate::llm::types::{ContentPart, Message, MessageContent, Role};

/// Stateless OpenAI-compatible adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiAdapter;

impl ProviderAdapter for OpenAiAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAiCompatible
    }

    fn endpoint(&self, base_url: &str) -> String {
        join_url(base_url, "chat/completions")
    }

    fn headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {api_key}");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| LlmError::ConfigError {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_body(&self, messages: &[Message], config: &EffectiveConfig, stream: bool) -> Value {
        json!({
            "model": config.model_id,
            "messages": messages_to_openai(messages),
            "max_tokens": config.max_tokens,
            "stream": stream,
        })
    }

    fn extract_text(&self, response: &Value) -> Result<String> {
        parse_openai_response(response)
    }

    fn parse_stream_data(&self, data: &str) -> Result<StreamDelta> {
        let v: Value = serde_json::from_str(data).map_err(|e| LlmError::ParseFailed {
            reason: format!("invalid JSON in OpenAI SSE data: {e}"),
        })?;

        match v["choices"][0]["delta"]["content"].as_str() {
            Some(text) if !text.is_empty() => Ok(StreamDelta::Text(text.to_owned())),
            _ => Ok(StreamDelta::Skip),
        }
    }
}

// ---------------------------------------------------------------------------
// Format conversion
// ---------------------------------------------------------------------------

/// Convert canonical messages to the Chat Completions wire format.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            json!({
                "role": role_name(msg.role),
                "content": content_to_openai(&msg.content),
            })
        })
        .collect()
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn content_to_openai(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => json!(text),
        MessageContent::Parts(parts) => {
            let wire: Vec<Value> = parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(json!({"type": "text", "text": text})),
                    ContentPart::ImageUrl { image_url } => Some(json!({
                        "type": "image_url",
                        "image_url": {"url": image_url.url},
                    })),
                    ContentPart::Unknown => None,
                })
                .collect();
            json!(wire)
        }
    }
}

/// Extract `choices[0].message.content` from a non-streaming response.
pub fn parse_openai_response(v: &Value) -> Result<String> {
    let message = &v["choices"][0]["message"];

    if message.is_null() {
        return Err(LlmError::ParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    // Some compatible servers send `content: null` for an empty answer.
    Ok(message["content"].as_str().unwrap_or_default().to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EffectiveConfig {
        EffectiveConfig {
            provider: Provider::OpenAiCompatible,
            base_url: "https://api.openai.com/v1".into(),
            api_key: "sk-test".into(),
            model_id: "gpt-4o".into(),
            max_tokens: 2048,
        }
    }

    #[test]
    fn build_body_keeps_system_message_in_array() {
        let messages = vec![Message::system("You are helpful."), Message::user("Hello")];
        let body = OpenAiAdapter.build_body(&messages, &config(), false);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["stream"], false);

        let wire = body["messages"].as_array().unwrap();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[0]["content"], "You are helpful.");
        assert_eq!(wire[1]["role"], "user");
        assert_eq!(wire[1]["content"], "Hello");
    }

    #[test]
    fn build_body_sets_stream_flag() {
        let body = OpenAiAdapter.build_body(&[Message::user("hi")], &config(), true);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn parts_forward_images_and_drop_unknown() {
        let messages = vec![Message::with_parts(
            Role::User,
            vec![
                ContentPart::text("What is this?"),
                ContentPart::Unknown,
                ContentPart::image("https://example.com/cat.png"),
            ],
        )];
        let wire = messages_to_openai(&messages);
        let parts = wire[0]["content"].as_array().unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "https://example.com/cat.png");
    }

    #[test]
    fn endpoint_and_headers() {
        assert_eq!(
            OpenAiAdapter.endpoint("http://localhost:11434/v1/"),
            "http://localhost:11434/v1/chat/completions"
        );
        let headers = OpenAiAdapter.headers("sk-test").unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-test");
    }

    #[test]
    fn header_rejects_control_characters() {
        assert!(OpenAiAdapter.headers("bad\nkey").is_err());
    }

    #[test]
    fn parse_text_response() {
        let response = json!({
            "id": "chatcmpl-abc",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello from OpenAI!"},
                "finish_reason": "stop"
            }]
        });
        assert_eq!(parse_openai_response(&response).unwrap(), "Hello from OpenAI!");
    }

    #[test]
    fn parse_response_without_choices_fails() {
        let err = parse_openai_response(&json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, LlmError::ParseFailed { .. }));
    }

    #[test]
    fn stream_data_text_delta() {
        let delta = OpenAiAdapter
            .parse_stream_data(r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Hello"}}]}"#)
            .unwrap();
        assert_eq!(delta, StreamDelta::Text("Hello".into()));
    }

    #[test]
    fn stream_data_role_only_chunk_is_skipped() {
        let delta = OpenAiAdapter
            .parse_stream_data(r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#)
            .unwrap();
        assert_eq!(delta, StreamDelta::Skip);

        let delta = OpenAiAdapter
            .parse_stream_data(r#"{"choices":[],"usage":{"prompt_tokens":3}}"#)
            .unwrap();
        assert_eq!(delta, StreamDelta::Skip);
    }

    #[test]
    fn stream_data_invalid_json_is_error() {
        assert!(OpenAiAdapter.parse_stream_data("{invalid json}").is_err());
    }
}
