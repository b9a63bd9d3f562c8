//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.  Nothing in it is mutated after startup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use diagramchat_llm::{GatewayDefaults, LlmClient};

/// Shared state accessible from every Axum handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Process-wide defaults, read-only after startup.
    pub defaults: Arc<GatewayDefaults>,

    /// Upstream HTTP client; clones share one connection pool.
    pub llm: LlmClient,

    /// When the server state was created, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    /// Build state from loaded defaults, creating the upstream client.
    pub fn new(defaults: GatewayDefaults) -> diagramchat_llm::Result<Self> {
        let llm = LlmClient::new(Duration::from_secs(defaults.timeout_secs))?;
        Ok(Self {
            defaults: Arc::new(defaults),
            llm,
            started_at: Instant::now(),
        })
    }
}
