//! Router peer clients
//!
//! A peer handle is bound to one instance's address and offers two calls:
//! a one-shot pause command and a long-lived drain event stream. Handles are
//! produced by a [`PeerConnector`] so coordinators never construct transport
//! clients themselves.

pub mod http;

pub use http::{HttpPeerClient, HttpPeerConnector};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::discovery::PeerInstance;
use crate::sse::EventStream;
use crate::types::Result;

/// Pause or unpause one logical service on every router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PauseCommand {
    pub target_kind: String,
    pub target_name: String,
    pub paused: bool,
}

impl PauseCommand {
    pub fn new(target_kind: impl Into<String>, target_name: impl Into<String>, paused: bool) -> Self {
        Self {
            target_kind: target_kind.into(),
            target_name: target_name.into(),
            paused,
        }
    }
}

/// Identifies the logical service every router must drain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainRequest {
    pub target_kind: String,
    pub target_name: String,
}

impl DrainRequest {
    pub fn new(target_kind: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            target_kind: target_kind.into(),
            target_name: target_name.into(),
        }
    }

    pub fn target(&self) -> String {
        format!("{}/{}", self.target_kind, self.target_name)
    }
}

/// Body of a pause command on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseBody {
    #[serde(alias = "pause")]
    pub paused: bool,
}

/// Client for one router instance
#[async_trait::async_trait]
pub trait PeerClient: Send + Sync {
    /// One round trip, no retry
    async fn send_command(&self, cmd: &PauseCommand) -> Result<()>;

    /// Open the drain event stream. Dropping the stream releases the
    /// connection.
    async fn open_drain_stream(&self, req: &DrainRequest) -> Result<EventStream>;
}

/// Builds a client for a discovered instance
pub trait PeerConnector: Send + Sync {
    fn connect(&self, instance: &PeerInstance) -> Arc<dyn PeerClient>;
}
