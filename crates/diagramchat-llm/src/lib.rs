//! Provider layer for the diagramchat gateway.
//!
//! This crate owns everything between the gateway's uniform chat contract and
//! the upstream LLM HTTP APIs.  It performs no request routing of its own; the
//! web crate decides *whether* a request may proceed, this crate decides *how*
//! it is spoken to the upstream.
//!
//! ## Architecture
//!
//! ```text
//!  ChatRequest ──> EffectiveConfig ──> ProviderAdapter ──> LlmClient ──> upstream
//!                                           │                  │
//!                                           │             byte stream
//!                                           │                  │
//!                                           └──── StreamNormalizer ──> data: {"content": ..}
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- Message model, provider adapters, HTTP client, stream normalizer.
//! - [`config`] -- Process-wide defaults and per-request credential resolution.
//! - [`error`] -- Provider-layer error types.

pub mod config;
pub mod error;
pub mod llm;

// Re-export the most commonly used types at the crate root.
pub use config::{EffectiveConfig, GatewayDefaults, Provider, ProviderCredential};
pub use error::{LlmError, Result};
pub use llm::{
    ChatRequest, ChatResponse, ContentPart, LlmClient, Message, MessageContent, Role,
    StreamNormalizer, normalize, to_provider_payload,
};
