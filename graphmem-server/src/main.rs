//! graphmem-server - reference binary wiring CLI flags into the engine
//!
//! Exposes the knowledge-graph memory service over a line-delimited stdio
//! transport or an HTTP event-stream transport, plus a `health` subcommand
//! for operational smoke-testing.

mod cli;
mod http;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use graphmem::manager::ConnectionManager;
use graphmem::mcp::McpServer;
use graphmem::metrics::{default_recorder, NoopRecorder};
use graphmem::service::ToolService;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, matches!(cli.command, Commands::Serve { transport: Transport::Stdio, .. }));

    let config = cli.config.build_config()?;
    let provider = cli.config.build_provider()?;

    match cli.command {
        Commands::Serve { transport, http_bind } => {
            let manager = ConnectionManager::new(config);
            let service = ToolService::new(manager, provider, default_recorder());

            match transport {
                Transport::Stdio => {
                    let server = McpServer::new(service);
                    server.run().await?;
                }
                Transport::Http => {
                    let server = McpServer::new(service);
                    let state = http::HttpState::new(server);
                    let app = http::router(state);

                    tracing::info!("graphmem HTTP event-stream transport listening on {http_bind}");
                    let listener = tokio::net::TcpListener::bind(http_bind).await?;
                    axum::serve(listener, app).await?;
                }
            }
        }
        Commands::Health => {
            let manager = ConnectionManager::new(config);
            let service = ToolService::new(manager, provider, Arc::new(NoopRecorder));
            let status = service.health_check().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

/// Initialize structured logging the way the teacher's binaries wire
/// `tracing_subscriber::EnvFilter`: quiet by default on the stdio transport
/// so log lines never interleave with the JSON-RPC protocol on stdout.
fn init_logging(verbose: bool, is_stdio: bool) {
    let filter = if let Ok(from_env) = std::env::var("RUST_LOG") {
        EnvFilter::new(from_env)
    } else if verbose {
        EnvFilter::new("debug")
    } else if is_stdio {
        EnvFilter::new("error")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
