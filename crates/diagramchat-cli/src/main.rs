//! CLI entry point for diagramchat.
//!
//! This binary provides the `diagramchat` command with subcommands for
//! starting the gateway and inspecting its configuration.

mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use diagramchat_llm::GatewayDefaults;
use diagramchat_llm::config::mask;
use diagramchat_web::{AppState, WebConfig, WebServer};

use crate::cli::{Cli, Commands};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal; real environment variables still apply.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            port,
            config,
            json_logs,
        } => cmd_serve(bind, port, config.as_deref(), json_logs).await,
        Commands::Status { config } => cmd_status(config.as_deref()),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(bind: String, port: u16, config: Option<&Path>, json_logs: bool) -> Result<()> {
    init_tracing("info", json_logs);

    let defaults = load_defaults(config)?;
    info!(
        provider = %defaults.effective_provider(),
        model = defaults.model_id.as_deref().unwrap_or("<unset>"),
        has_default_key = defaults.has_api_key(),
        password_required = defaults.password().is_some(),
        "configuration loaded"
    );

    let state = AppState::new(defaults).context("failed to build upstream HTTP client")?;
    let server = WebServer::new(
        WebConfig {
            bind_addr: bind,
            port,
        },
        state,
    );

    println!("  diagramchat listening on http://{}", server.addr());

    server
        .start()
        .await
        .context("web server exited with an error")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

fn cmd_status(config: Option<&Path>) -> Result<()> {
    init_tracing("warn", false);

    let defaults = load_defaults(config)?;
    let provider = defaults.effective_provider();

    println!();
    println!("  diagramchat Status");
    println!("  ==================");
    println!();
    println!("  Provider:         {provider}");
    println!(
        "  Base URL:         {}",
        defaults
            .base_url
            .as_deref()
            .unwrap_or_else(|| provider.public_base_url())
    );
    println!(
        "  Model:            {}",
        defaults.model_id.as_deref().unwrap_or("NOT SET")
    );
    println!(
        "  API key:          {}",
        defaults
            .api_key
            .as_deref()
            .filter(|_| defaults.has_api_key())
            .map_or_else(|| "NOT SET (callers must bring their own)".to_owned(), mask)
    );
    println!(
        "  Access password:  {}",
        if defaults.password().is_some() {
            "set"
        } else {
            "NOT SET (own credentials required)"
        }
    );
    println!("  Max tokens:       {}", defaults.max_tokens);
    println!("  Call timeout:     {}s", defaults.timeout_secs);
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_defaults(config: Option<&Path>) -> Result<GatewayDefaults> {
    GatewayDefaults::load(config).with_context(|| match config {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load configuration from the environment".to_owned(),
    })
}

/// Initialize the tracing subscriber.  `RUST_LOG` overrides `default_level`.
fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
