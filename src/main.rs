//! Floodgate - rolling drain and pause control for the router tier

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use floodgate::{config::Args, logging, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Floodgate - router tier control");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Router service: {}", args.router_service);
    match args.peer_addr_list() {
        Some(addrs) => info!("Routers: fixed list {:?}", addrs),
        None => info!("Discovery: {}", args.discoverd_url),
    }
    info!("Router API: {}", args.router_api_url);
    info!(
        "Timeouts: discovery {:?}, peer request {:?}, drain stream {}",
        args.discovery_timeout(),
        args.peer_request_timeout(),
        args.drain_stream_timeout()
            .map(|t| format!("{:?}", t))
            .unwrap_or_else(|| "unbounded".to_string())
    );
    info!("Drain failure policy: {}", args.drain_failure_policy);
    info!("======================================");

    let state = match AppState::from_args(args) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    server::run(state).await?;

    Ok(())
}
