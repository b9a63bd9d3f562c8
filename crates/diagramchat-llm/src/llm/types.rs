//! Canonical message model shared by the chat client and the gateway.
//!
//! These types are provider-agnostic; the adapters in [`super::openai`] and
//! [`super::anthropic`] translate them into each upstream's wire format.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::ProviderCredential;
use crate::error::{LlmError, Result};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that shape model behavior.
    System,
    /// Input from the human user.
    User,
    /// Output from the LLM.
    Assistant,
}

/// Message content: either plain text or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of multimodal message content.
///
/// Parts whose `type` tag is missing or unrecognised deserialize to
/// [`ContentPart::Unknown`] rather than failing the whole request; they
/// produce no wire content.  A recognised tag with a malformed body is
/// still an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A run of text.
    Text { text: String },
    /// An image, referenced by HTTP(S) URL or base64 data URL.
    ImageUrl { image_url: ImageUrl },
    Unknown,
}

/// The part shapes the gateway understands.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value.get("type").and_then(Value::as_str) {
            Some("text" | "image_url") => {
                let part = KnownPart::deserialize(value).map_err(D::Error::custom)?;
                Ok(match part {
                    KnownPart::Text { text } => Self::Text { text },
                    KnownPart::ImageUrl { image_url } => Self::ImageUrl { image_url },
                })
            }
            _ => Ok(Self::Unknown),
        }
    }
}

/// The `image_url` payload of an image part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image part.
    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(content.into()))
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(content.into()))
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(content.into()))
    }

    /// Create a message from explicit content parts.
    pub fn with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self::new(role, MessageContent::Parts(parts))
    }

    fn new(role: Role, content: MessageContent) -> Self {
        Self { role, content }
    }

    /// Concatenated text of the message, ignoring non-text parts.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway request / response
// ---------------------------------------------------------------------------

/// The uniform chat request accepted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The conversation history; must be non-empty.
    pub messages: Vec<Message>,

    /// Whether to relay the answer as an event stream.
    #[serde(default)]
    pub stream: bool,

    /// Caller-supplied credential taking precedence over server defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_override: Option<ProviderCredential>,
}

impl ChatRequest {
    /// Check the structural invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(LlmError::ValidationError {
                reason: "`messages` must contain at least one message".into(),
            });
        }

        for (index, message) in self.messages.iter().enumerate() {
            if let MessageContent::Parts(parts) = &message.content
                && parts.is_empty()
            {
                return Err(LlmError::ValidationError {
                    reason: format!("message {index} has an empty content array"),
                });
            }
        }

        Ok(())
    }

    /// The override credential, if it is usable.
    pub fn usable_override(&self) -> Option<&ProviderCredential> {
        self.credential_override.as_ref().filter(|c| c.is_usable())
    }
}

/// Non-streaming gateway response, and the payload of each streamed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
}

// ---------------------------------------------------------------------------
// Inline images
// ---------------------------------------------------------------------------

/// A data-URL image decomposed into its media type and base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub media_type: String,
    pub data: String,
}

static DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:([^;,]+);base64,(.+)$").expect("data URL pattern is valid")
});

/// Decompose `data:<mediaType>;base64,<payload>`.  Returns `None` for any
/// other URL.
pub fn parse_data_url(url: &str) -> Option<InlineImage> {
    let caps = DATA_URL.captures(url.trim())?;
    Some(InlineImage {
        media_type: caps[1].to_owned(),
        data: caps[2].to_owned(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;

    #[test]
    fn deserialize_string_and_parts_content() {
        let req: ChatRequest = serde_json::from_str(
            r#"{
                "messages": [
                    {"role": "system", "content": "Draw diagrams."},
                    {"role": "user", "content": [
                        {"type": "text", "text": "Convert this"},
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                    ]}
                ]
            }"#,
        )
        .unwrap();

        assert!(!req.stream);
        assert!(req.credential_override.is_none());
        assert_eq!(req.messages[0].content, MessageContent::Text("Draw diagrams.".into()));
        match &req.messages[1].content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0], ContentPart::text("Convert this"));
                assert_eq!(parts[1], ContentPart::image("data:image/png;base64,AAAA"));
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn unknown_part_type_is_not_an_error() {
        let msg: Message = serde_json::from_str(
            r#"{"role": "user", "content": [{"type": "file", "name": "a.pdf"}, {"type": "text", "text": "hi"}]}"#,
        )
        .unwrap();
        match msg.content {
            MessageContent::Parts(parts) => assert_eq!(parts[0], ContentPart::Unknown),
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn untagged_part_is_unknown() {
        let msg: Message =
            serde_json::from_str(r#"{"role": "user", "content": [{"text": "x"}, {"type": "text", "text": "hi"}]}"#)
                .unwrap();
        assert_eq!(
            msg.content,
            MessageContent::Parts(vec![ContentPart::Unknown, ContentPart::text("hi")])
        );
    }

    #[test]
    fn known_tag_with_bad_shape_is_an_error() {
        let result = serde_json::from_str::<Message>(
            r#"{"role": "user", "content": [{"type": "image_url", "image_url": "not-an-object"}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn credential_override_uses_camel_case() {
        let req: ChatRequest = serde_json::from_str(
            r#"{
                "messages": [{"role": "user", "content": "hello"}],
                "stream": true,
                "credentialOverride": {
                    "provider": "anthropic-compatible",
                    "baseUrl": "https://proxy.example/v1",
                    "apiKey": "sk-ant-xyz",
                    "modelId": "claude-sonnet-4-20250514"
                }
            }"#,
        )
        .unwrap();

        assert!(req.stream);
        let cred = req.usable_override().unwrap();
        assert_eq!(cred.provider, Some(Provider::AnthropicCompatible));
        assert_eq!(cred.base_url, "https://proxy.example/v1");
        assert_eq!(cred.model_id, "claude-sonnet-4-20250514");
    }

    #[test]
    fn empty_key_override_is_not_usable() {
        let req: ChatRequest = serde_json::from_str(
            r#"{
                "messages": [{"role": "user", "content": "hello"}],
                "credentialOverride": {"provider": "openai-compatible", "baseUrl": "", "apiKey": "", "modelId": ""}
            }"#,
        )
        .unwrap();
        assert!(req.credential_override.is_some());
        assert!(req.usable_override().is_none());
    }

    #[test]
    fn validate_rejects_empty_messages_and_parts() {
        let empty = ChatRequest {
            messages: vec![],
            stream: false,
            credential_override: None,
        };
        assert!(empty.validate().unwrap_err().is_client_error());

        let empty_parts = ChatRequest {
            messages: vec![Message::with_parts(Role::User, vec![])],
            stream: false,
            credential_override: None,
        };
        assert!(empty_parts.validate().is_err());

        let ok = ChatRequest {
            messages: vec![Message::user("hi")],
            stream: false,
            credential_override: None,
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn message_text_joins_text_parts() {
        let msg = Message::with_parts(
            Role::System,
            vec![
                ContentPart::text("You draw "),
                ContentPart::image("https://example.com/x.png"),
                ContentPart::text("diagrams."),
            ],
        );
        assert_eq!(msg.text(), "You draw diagrams.");
    }

    #[test]
    fn data_url_decomposes() {
        let image = parse_data_url("data:image/png;base64,AAAA").unwrap();
        assert_eq!(image.media_type, "image/png");
        assert_eq!(image.data, "AAAA");
    }

    #[test]
    fn non_data_urls_do_not_decompose() {
        assert!(parse_data_url("https://example.com/cat.png").is_none());
        assert!(parse_data_url("data:image/png,AAAA").is_none());
        assert!(parse_data_url("data:image/png;base64,").is_none());
    }
}
