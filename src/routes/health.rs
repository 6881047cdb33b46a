//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - Liveness (is the process serving?)
//! - /ready, /readyz - Readiness (can the router service be resolved?)

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub node_id: String,
    /// Seconds since the server state was built
    pub uptime: i64,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub router_service: String,
    /// Router instances currently registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

/// Handle liveness probe (/health, /healthz)
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let now = chrono::Utc::now();
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        node_id: state.args.node_id.to_string(),
        uptime: (now - state.started_at).num_seconds(),
        timestamp: now.to_rfc3339(),
    };
    json_response(StatusCode::OK, &response)
}

/// Handle readiness probe (/ready, /readyz)
///
/// Ready means a pause or drain issued now would get past discovery. An
/// empty router service still counts as ready.
pub async fn readiness_check(state: &AppState) -> Response<Full<Bytes>> {
    let service = &state.args.router_service;
    match state
        .directory
        .resolve(service, state.args.discovery_timeout())
        .await
    {
        Ok(peers) => json_response(
            StatusCode::OK,
            &ReadinessResponse {
                ready: true,
                router_service: service.clone(),
                peers: Some(peers.len()),
                error: None,
            },
        ),
        Err(e) => json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &ReadinessResponse {
                ready: false,
                router_service: service.clone(),
                peers: None,
                error: Some(e.to_json()),
            },
        ),
    }
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    pub commit_full: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "floodgate",
    };
    json_response(StatusCode::OK, &response)
}
