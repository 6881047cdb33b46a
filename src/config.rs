//! Configuration for floodgate
//!
//! CLI arguments and environment variable handling using clap.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use uuid::Uuid;

use crate::coordinator::{DrainConfig, DrainFailurePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Floodgate - pause and drain services across the router tier
#[derive(Parser, Debug, Clone)]
#[command(name = "floodgate")]
#[command(about = "Control plane for pausing and draining services across the router tier")]
pub struct Args {
    /// Unique identifier for this controller instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Discovery name of the router service whose instances are paused and drained
    #[arg(long, env = "ROUTER_SERVICE", default_value = "router-api")]
    pub router_service: String,

    /// Discovery daemon base URL
    #[arg(long, env = "DISCOVERD_URL", default_value = "http://127.0.0.1:1111")]
    pub discoverd_url: String,

    /// Comma-separated router addresses (host:port)
    /// If set, replaces the discovery daemon with this fixed list
    #[arg(long, env = "PEER_ADDRS")]
    pub peer_addrs: Option<String>,

    /// Upper bound on resolving the router service, in milliseconds
    #[arg(long, env = "DISCOVERY_TIMEOUT_MS", default_value = "1000")]
    pub discovery_timeout_ms: u64,

    /// Timeout for one pause command to one router, in milliseconds
    #[arg(long, env = "PEER_REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub peer_request_timeout_ms: u64,

    /// How long one router may take to report drain completion, in milliseconds
    /// 0 waits indefinitely
    #[arg(long, env = "DRAIN_STREAM_TIMEOUT_MS", default_value = "600000")]
    pub drain_stream_timeout_ms: u64,

    /// Whether a router that fails mid-drain still counts toward completion
    #[arg(long, env = "DRAIN_FAILURE_POLICY", value_enum, default_value_t = DrainFailurePolicy::Count)]
    pub drain_failure_policy: DrainFailurePolicy,

    /// Router API base URL for route records
    #[arg(long, env = "ROUTER_API_URL", default_value = "http://router-api.discoverd")]
    pub router_api_url: String,
}

impl Args {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn peer_request_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_request_timeout_ms)
    }

    /// `None` when drains may wait indefinitely
    pub fn drain_stream_timeout(&self) -> Option<Duration> {
        match self.drain_stream_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn drain_config(&self) -> DrainConfig {
        DrainConfig {
            discovery_timeout: self.discovery_timeout(),
            stream_timeout: self.drain_stream_timeout(),
            failure_policy: self.drain_failure_policy,
        }
    }

    /// Parsed `PEER_ADDRS`, if a fixed list was given
    pub fn peer_addr_list(&self) -> Option<Vec<String>> {
        self.peer_addrs.as_ref().map(|addrs| {
            addrs
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.router_service.trim().is_empty() {
            return Err("ROUTER_SERVICE must not be empty".to_string());
        }
        if self.discovery_timeout_ms == 0 {
            return Err("DISCOVERY_TIMEOUT_MS must be greater than zero".to_string());
        }
        if self.peer_request_timeout_ms == 0 {
            return Err("PEER_REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }
        if let Some(addrs) = self.peer_addr_list() {
            for addr in &addrs {
                if addr.contains("://") || !addr.contains(':') {
                    return Err(format!("PEER_ADDRS entry '{}' is not host:port", addr));
                }
            }
        }
        if !self.discoverd_url.starts_with("http://") && !self.discoverd_url.starts_with("https://") {
            return Err("DISCOVERD_URL must be an http(s) URL".to_string());
        }
        if !self.router_api_url.starts_with("http://") && !self.router_api_url.starts_with("https://") {
            return Err("ROUTER_API_URL must be an http(s) URL".to_string());
        }
        Ok(())
    }
}
