//! Discovery daemon client
//!
//! `GET {base}/services/{service}/instances` returns a JSON array of
//! registered instances; only `addr` is used here.

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{PeerInstance, ServiceDiscovery};
use crate::types::{ControlError, Result};

#[derive(Debug, Deserialize)]
struct InstanceDoc {
    addr: String,
}

/// Discovery over the daemon's HTTP API
pub struct HttpDiscovery {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpDiscovery {
    pub fn new(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }

    fn instances_url(&self, service: &str) -> String {
        format!("{}/services/{}/instances", self.base_url, service)
    }
}

#[async_trait::async_trait]
impl ServiceDiscovery for HttpDiscovery {
    async fn instances(&self, service: &str) -> Result<Vec<PeerInstance>> {
        let url = self.instances_url(service);
        debug!("Querying discovery at {}", url);

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ControlError::DiscoveryUnavailable(format!("{url}: {e}")))?;

        // The daemon answers 404 for a service nobody has registered yet
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(ControlError::DiscoveryUnavailable(format!(
                "{url} returned {}",
                response.status()
            )));
        }

        let docs: Vec<InstanceDoc> = response
            .json()
            .await
            .map_err(|e| ControlError::DiscoveryUnavailable(format!("invalid instance list: {e}")))?;

        Ok(docs
            .into_iter()
            .map(|doc| PeerInstance::new(service, doc.addr))
            .collect())
    }
}
