//! HTTP routes for floodgate

pub mod app_routes;
pub mod health;
pub mod services;
pub mod status;

pub use app_routes::{handle_create_route, handle_delete_route, handle_get_route, handle_list_routes};
pub use health::{health_check, readiness_check, version_info};
pub use services::{handle_drain, handle_pause};
pub use status::status_check;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{ControlError, Result};

/// Largest request body accepted
const MAX_BODY_BYTES: usize = 64 * 1024;

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"error":"internal_error","message":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

pub(crate) fn error_response(err: &ControlError) -> Response<Full<Bytes>> {
    json_response(err.status_code(), &err.to_json())
}

pub(crate) fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Read and parse a JSON request body
pub(crate) async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| ControlError::BadRequest(format!("Failed to read request body: {}", e)))?
        .to_bytes();

    serde_json::from_slice(&body).map_err(|e| ControlError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Path segments naming a service or route must be non-empty
pub(crate) fn require_segment(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ControlError::BadRequest(format!("{} must not be empty", name)));
    }
    Ok(())
}
