//! HTTP gateway for diagramchat.
//!
//! This crate exposes the provider layer over HTTP:
//!
//! - `POST /chat` -- the uniform chat endpoint, answering with JSON or a
//!   normalized `text/event-stream`.
//! - `GET /api/status` -- liveness and a secret-free summary of the
//!   server defaults.
//!
//! Every chat request passes the [`auth`] gate before any upstream
//! configuration is consulted.

pub mod api;
pub mod auth;
pub mod error;
pub mod server;
pub mod state;

pub use auth::{AccessDecision, authorize};
pub use error::ApiError;
pub use server::WebServer;
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3000,
        }
    }
}
