//! Peer discovery
//!
//! Resolves the live instances of a named service. Every fan-out operation
//! starts with one `PeerDirectory::resolve` call and works against that
//! snapshot only; nothing here is cached between calls.
//!
//! ## Backends
//!
//! - [`HttpDiscovery`]: asks the discovery daemon over HTTP
//! - [`StaticDiscovery`]: fixed address list from configuration

pub mod fixed;
pub mod http;

pub use fixed::StaticDiscovery;
pub use http::HttpDiscovery;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::types::{ControlError, Result};

/// One live process of a discovered service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeerInstance {
    pub service: String,
    /// Network endpoint, `host:port`
    pub addr: String,
}

impl PeerInstance {
    pub fn new(service: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            addr: addr.into(),
        }
    }
}

/// Source of service membership (allows fakes in tests)
#[async_trait::async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Current live instances of `service`. An empty list is a valid answer.
    async fn instances(&self, service: &str) -> Result<Vec<PeerInstance>>;
}

/// Bounded-wait front for a discovery backend
#[derive(Clone)]
pub struct PeerDirectory {
    backend: Arc<dyn ServiceDiscovery>,
}

impl PeerDirectory {
    pub fn new(backend: Arc<dyn ServiceDiscovery>) -> Self {
        Self { backend }
    }

    /// Resolve the instances of `service`, failing rather than returning a
    /// partial set if the backend does not answer within `max_wait`.
    pub async fn resolve(&self, service: &str, max_wait: Duration) -> Result<Vec<PeerInstance>> {
        match tokio::time::timeout(max_wait, self.backend.instances(service)).await {
            Ok(Ok(instances)) => {
                debug!(service, peers = instances.len(), "Resolved service instances");
                Ok(instances)
            }
            Ok(Err(e)) => {
                warn!(service, error = %e, "Discovery failed");
                Err(e)
            }
            Err(_) => {
                warn!(service, waited = ?max_wait, "Discovery timed out");
                Err(ControlError::DiscoveryTimeout {
                    service: service.to_string(),
                    waited: max_wait,
                })
            }
        }
    }
}
