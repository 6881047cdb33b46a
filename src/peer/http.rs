//! HTTP client for a router instance's API
//!
//! - pause: `PUT /services/{kind}/{name}` with `{"paused": bool}`
//! - drain: `GET /services/{kind}/{name}/drain` answered with an event stream

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::debug;

use super::{DrainRequest, PauseBody, PauseCommand, PeerClient, PeerConnector};
use crate::discovery::PeerInstance;
use crate::sse::{EventStream, EventStreamDecoder};
use crate::types::{ControlError, Result};

/// Longest response body excerpt kept in a rejection reason
const MAX_REASON_LEN: usize = 200;

/// Client bound to one router instance
pub struct HttpPeerClient {
    addr: String,
    base_url: String,
    http_client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpPeerClient {
    pub fn new(addr: impl Into<String>, http_client: reqwest::Client, request_timeout: Duration) -> Self {
        let addr = addr.into();
        let base_url = if addr.contains("://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", addr)
        };
        Self {
            addr,
            base_url,
            http_client,
            request_timeout,
        }
    }

    fn service_url(&self, kind: &str, name: &str) -> String {
        format!("{}/services/{}/{}", self.base_url, kind, name)
    }

    fn unreachable(&self, err: reqwest::Error) -> ControlError {
        ControlError::PeerUnreachable {
            addr: self.addr.clone(),
            reason: err.to_string(),
        }
    }

    async fn rejection(&self, response: reqwest::Response) -> ControlError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ControlError::PeerRejected {
            addr: self.addr.clone(),
            reason: rejection_reason(status, &body),
        }
    }
}

/// `HTTP <status>` plus at most [`MAX_REASON_LEN`] bytes of the body, cut on
/// a character boundary
fn rejection_reason(status: reqwest::StatusCode, body: &str) -> String {
    let mut cut = body.len().min(MAX_REASON_LEN);
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    let excerpt = body[..cut].trim();
    if excerpt.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, excerpt)
    }
}

#[async_trait::async_trait]
impl PeerClient for HttpPeerClient {
    async fn send_command(&self, cmd: &PauseCommand) -> Result<()> {
        let url = self.service_url(&cmd.target_kind, &cmd.target_name);
        debug!(peer = %self.addr, paused = cmd.paused, "PUT {}", url);

        let response = self
            .http_client
            .put(&url)
            .timeout(self.request_timeout)
            .json(&PauseBody { paused: cmd.paused })
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.rejection(response).await)
        }
    }

    async fn open_drain_stream(&self, req: &DrainRequest) -> Result<EventStream> {
        let url = format!("{}/drain", self.service_url(&req.target_kind, &req.target_name));
        debug!(peer = %self.addr, "GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !response.status().is_success() {
            return Err(self.rejection(response).await);
        }

        let addr = self.addr.clone();
        let bytes = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| ControlError::PeerUnreachable {
                    addr: addr.clone(),
                    reason: e.to_string(),
                })
            })
            .boxed();

        Ok(EventStreamDecoder::new(self.addr.clone(), bytes).into_stream())
    }
}

/// Builds [`HttpPeerClient`]s sharing one connection pool
#[derive(Clone)]
pub struct HttpPeerConnector {
    http_client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpPeerConnector {
    pub fn new(http_client: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            http_client,
            request_timeout,
        }
    }
}

impl PeerConnector for HttpPeerConnector {
    fn connect(&self, instance: &PeerInstance) -> Arc<dyn PeerClient> {
        Arc::new(HttpPeerClient::new(
            instance.addr.clone(),
            self.http_client.clone(),
            self.request_timeout,
        ))
    }
}
