//! Gateway binary: load configuration, wire observability, serve.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use obe_gateway::config::load_config;
use obe_gateway::http::HttpServer;
use obe_gateway::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "obe-gateway")]
#[command(about = "Authentication and rate-limiting gateway for the OBE curriculum API")]
struct Args {
    /// Path to a TOML configuration file. Environment variables
    /// override file values.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        rate_limit_max = config.rate_limit.max_requests,
        rate_limit_window_secs = config.rate_limit.window_secs,
        environment = ?config.security.environment,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(address) => metrics::init(address),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(config).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
