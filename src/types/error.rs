//! Error types for floodgate
//!
//! Every failure a caller can observe maps onto one of these variants. The
//! classes (discovery, peer, protocol, route) stay distinguishable in both the
//! HTTP status and the `error` field of the JSON body.

use std::time::Duration;

use hyper::StatusCode;
use serde_json::json;

use crate::discovery::PeerInstance;

/// Main error type for control-plane operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ControlError {
    #[error("Discovery of '{service}' timed out after {waited:?}")]
    DiscoveryTimeout { service: String, waited: Duration },

    #[error("Discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    #[error("Peer {addr} unreachable: {reason}")]
    PeerUnreachable { addr: String, reason: String },

    #[error("Peer {addr} rejected command: {reason}")]
    PeerRejected { addr: String, reason: String },

    #[error("Protocol error from {addr}: {reason}")]
    Protocol { addr: String, reason: String },

    #[error("{} peer(s) failed: {}", .0.len(), summarize(.0))]
    AggregateFailure(Vec<PeerFailure>),

    #[error("Route not found")]
    RouteNotFound,

    #[error("Routing backend error: {0}")]
    Backend(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Caller disconnected")]
    CallerGone,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// One peer's failure inside a fan-out operation
#[derive(Debug, Clone)]
pub struct PeerFailure {
    pub instance: PeerInstance,
    pub error: ControlError,
}

impl PeerFailure {
    pub fn new(instance: PeerInstance, error: ControlError) -> Self {
        Self { instance, error }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "addr": self.instance.addr,
            "error": self.error.kind(),
            "message": self.error.to_string(),
        })
    }
}

fn summarize(failures: &[PeerFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.instance.addr, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ControlError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DiscoveryTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::DiscoveryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PeerUnreachable { .. } => StatusCode::BAD_GATEWAY,
            Self::PeerRejected { .. } => StatusCode::BAD_GATEWAY,
            Self::Protocol { .. } => StatusCode::BAD_GATEWAY,
            Self::AggregateFailure(_) => StatusCode::BAD_GATEWAY,
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::CallerGone => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name for the error class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DiscoveryTimeout { .. } => "discovery_timeout",
            Self::DiscoveryUnavailable(_) => "discovery_unavailable",
            Self::PeerUnreachable { .. } => "peer_unreachable",
            Self::PeerRejected { .. } => "peer_rejected",
            Self::Protocol { .. } => "protocol_error",
            Self::AggregateFailure(_) => "aggregate_failure",
            Self::RouteNotFound => "not_found",
            Self::Backend(_) => "backend_error",
            Self::BadRequest(_) => "bad_request",
            Self::CallerGone => "caller_gone",
            Self::Internal(_) => "internal_error",
            Self::Config(_) => "config_error",
        }
    }

    /// JSON body for HTTP error responses
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let Self::AggregateFailure(failures) = self {
            body["failures"] = failures.iter().map(PeerFailure::to_json).collect();
        }
        body
    }
}

impl From<std::io::Error> for ControlError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for ControlError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

/// Result type alias for control-plane operations
pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(addr: &str) -> PeerInstance {
        PeerInstance::new("router-api", addr)
    }

    #[test]
    fn test_status_codes_by_class() {
        let timeout = ControlError::DiscoveryTimeout {
            service: "router-api".to_string(),
            waited: Duration::from_secs(1),
        };
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ControlError::DiscoveryUnavailable("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ControlError::RouteNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ControlError::AggregateFailure(vec![]).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_aggregate_failure_body_lists_every_peer() {
        let err = ControlError::AggregateFailure(vec![
            PeerFailure::new(
                instance("10.0.0.1:5000"),
                ControlError::PeerUnreachable {
                    addr: "10.0.0.1:5000".into(),
                    reason: "connection refused".into(),
                },
            ),
            PeerFailure::new(
                instance("10.0.0.2:5000"),
                ControlError::PeerRejected {
                    addr: "10.0.0.2:5000".into(),
                    reason: "HTTP 500".into(),
                },
            ),
        ]);

        let body = err.to_json();
        assert_eq!(body["error"], "aggregate_failure");
        let failures = body["failures"].as_array().unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0]["addr"], "10.0.0.1:5000");
        assert_eq!(failures[0]["error"], "peer_unreachable");
        assert_eq!(failures[1]["error"], "peer_rejected");
        assert!(err.to_string().starts_with("2 peer(s) failed"));
    }

    #[test]
    fn test_route_not_found_message_names_nothing() {
        let body = ControlError::RouteNotFound.to_json();
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "Route not found");
        assert!(body.get("failures").is_none());
    }
}
