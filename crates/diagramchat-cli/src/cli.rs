//! CLI argument definitions for diagramchat.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// diagramchat -- a multi-provider chat gateway.
#[derive(Parser)]
#[command(
    name = "diagramchat",
    version,
    about = "diagramchat -- multi-provider LLM chat gateway",
    long_about = "Accepts one uniform chat request and forwards it to an OpenAI-compatible \
                  or Anthropic-compatible upstream, answering with JSON or a normalized \
                  event stream."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway HTTP server.
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port to listen on.
        #[arg(long, short, default_value_t = 3000)]
        port: u16,

        /// TOML file with gateway defaults; environment variables override it.
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Emit logs as JSON lines instead of the compact format.
        #[arg(long)]
        json_logs: bool,
    },

    /// Show the resolved gateway defaults, with secrets masked.
    Status {
        /// TOML file with gateway defaults; environment variables override it.
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}
