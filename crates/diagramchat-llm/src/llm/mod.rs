//! LLM integration layer.
//!
//! - [`types`] -- Canonical messages, chat request/response, data URLs.
//! - [`adapter`] -- The per-provider translation capability.
//! - [`openai`] -- OpenAI Chat Completions adapter.
//! - [`anthropic`] -- Anthropic Messages adapter.
//! - [`client`] -- HTTP client issuing `call` / `open_stream`.
//! - [`normalizer`] -- Upstream SSE to gateway event reframing.

pub mod adapter;
pub mod anthropic;
pub mod client;
pub mod normalizer;
pub mod openai;
pub mod types;

// Re-export the most commonly used types for convenience.
pub use adapter::{ProviderAdapter, StreamDelta, to_provider_payload};
pub use client::{ByteStream, LlmClient};
pub use normalizer::{DONE_FRAME, MAX_LINE_BYTES, StreamNormalizer, content_frame, normalize};
pub use types::{
    ChatRequest, ChatResponse, ContentPart, ImageUrl, InlineImage, Message, MessageContent, Role,
    parse_data_url,
};
