//! Status endpoint
//!
//! Reports what the control plane is doing right now: every pause and drain
//! still in flight, with its peer progress.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::coordinator::OperationSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub node_id: String,
    pub version: &'static str,
    pub router_service: String,
    pub started_at: String,
    pub uptime: i64,
    pub drain_failure_policy: String,
    pub operations: Vec<OperationSnapshot>,
}

/// Handle status endpoint (/status)
pub fn status_check(state: &AppState) -> Response<Full<Bytes>> {
    let response = StatusResponse {
        node_id: state.args.node_id.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        router_service: state.args.router_service.clone(),
        started_at: state.started_at.to_rfc3339(),
        uptime: (chrono::Utc::now() - state.started_at).num_seconds(),
        drain_failure_policy: state.args.drain_failure_policy.to_string(),
        operations: state.operations.snapshot(),
    };
    json_response(StatusCode::OK, &response)
}
