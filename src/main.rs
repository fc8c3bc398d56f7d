use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

use portico::config::Config;
use portico::proxy::ProxyServer;

#[derive(Parser)]
#[command(name = "portico")]
#[command(about = "A caching forward HTTP proxy with domain allow-listing")]
struct Args {
    #[arg(short, long, default_value = "config/config.toml")]
    config: String,

    #[arg(short, long)]
    bind: Option<SocketAddr>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("portico={}", level))
        .init();

    info!("Starting portico forward proxy");

    // Load configuration
    let config = Config::from_file_with_env(&args.config).await?;
    info!("Loaded configuration from {}", args.config);

    // CLI bind address overrides the configured one
    let bind_addr = args.bind.unwrap_or(config.server.bind);

    let proxy_server = ProxyServer::new(config, bind_addr);

    // Setup graceful shutdown
    let shutdown_signal = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        warn!("Received CTRL+C, shutting down gracefully...");
    };

    // Run the proxy server with graceful shutdown
    tokio::select! {
        result = proxy_server.run() => {
            if let Err(e) = result {
                tracing::error!("Proxy server error: {}", e);
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received");
        }
    }

    info!("Portico shutdown complete");
    Ok(())
}
