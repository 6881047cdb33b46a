//! Fixed peer list

use super::{PeerInstance, ServiceDiscovery};
use crate::types::Result;

/// Discovery backed by a configured address list
///
/// Every service name resolves to the same addresses. Used for development
/// and for clusters without a discovery daemon.
pub struct StaticDiscovery {
    addrs: Vec<String>,
}

impl StaticDiscovery {
    pub fn new(addrs: Vec<String>) -> Self {
        Self { addrs }
    }
}

#[async_trait::async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn instances(&self, service: &str) -> Result<Vec<PeerInstance>> {
        Ok(self
            .addrs
            .iter()
            .map(|addr| PeerInstance::new(service, addr.clone()))
            .collect())
    }
}
