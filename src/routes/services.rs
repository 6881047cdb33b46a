//! Service control endpoints
//!
//! - `PUT /services/{kind}/{name}` - pause or unpause on every router
//! - `GET /services/{kind}/{name}/drain` - event stream ending in one
//!   completion event once every router has drained
//!
//! Discovery failures are answered as plain JSON errors: nothing about a
//! drain is streamed until membership is known.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::{info, warn};

use super::{empty_response, error_response, read_json, require_segment};
use crate::coordinator::OperationKind;
use crate::peer::{DrainRequest, PauseBody, PauseCommand};
use crate::server::http::to_boxed;
use crate::server::{AppState, BoxBody};
use crate::sse::{event_stream, EVENT_STREAM_CONTENT_TYPE};

/// Frames buffered between the drain task and the caller's connection
const DRAIN_STREAM_BUFFER: usize = 8;

/// Handle `PUT /services/{kind}/{name}`
pub async fn handle_pause(
    req: Request<Incoming>,
    state: Arc<AppState>,
    kind: &str,
    name: &str,
) -> Response<Full<Bytes>> {
    let body: PauseBody = match read_json(req).await {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = require_segment("kind", kind).and_then(|_| require_segment("name", name)) {
        return error_response(&e);
    }

    let cmd = PauseCommand::new(kind, name, body.paused);
    let op_kind = if cmd.paused {
        OperationKind::Pause
    } else {
        OperationKind::Unpause
    };
    let operation = state.operations.register(op_kind, format!("{}/{}", kind, name));

    match state
        .pause
        .broadcast_tracked(&state.args.router_service, &cmd, Some(&operation))
        .await
    {
        Ok(report) => {
            info!(
                kind,
                name,
                paused = cmd.paused,
                peers = report.acknowledged.len(),
                "Pause applied"
            );
            empty_response(StatusCode::OK)
        }
        Err(e) => {
            warn!(kind, name, error = %e, "Pause failed");
            error_response(&e)
        }
    }
}

/// Handle `GET /services/{kind}/{name}/drain`
///
/// The drain runs on its own task so the response head can be sent right
/// away. If the caller disconnects first the task stops and every peer
/// stream is closed.
pub async fn handle_drain(state: Arc<AppState>, kind: &str, name: &str) -> Response<BoxBody> {
    if let Err(e) = require_segment("kind", kind).and_then(|_| require_segment("name", name)) {
        return to_boxed(error_response(&e));
    }

    let request = DrainRequest::new(kind, name);
    let target = request.target();
    let operation = state.operations.register(OperationKind::Drain, target.clone());

    let drain = match state.drain.begin(&state.args.router_service, request).await {
        Ok(drain) => drain,
        Err(e) => {
            warn!(target = %target, error = %e, "Drain could not start");
            return to_boxed(error_response(&e));
        }
    };
    operation.set_expected(drain.expected());
    let drain = drain.with_progress(operation.progress());

    let (encoder, body) = event_stream(DRAIN_STREAM_BUFFER);
    let mut sink = encoder.clone();
    tokio::spawn(async move {
        let _operation = operation;
        tokio::select! {
            result = drain.run(&mut sink) => {
                if let Err(e) = result {
                    warn!(target = %target, error = %e, "Drain failed");
                }
            }
            _ = encoder.closed() => {
                info!(target = %target, "Caller disconnected, abandoning drain");
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", EVENT_STREAM_CONTENT_TYPE)
        .header("Cache-Control", "no-cache")
        .body(body.map_err(|never| match never {}).boxed())
        .unwrap()
}
