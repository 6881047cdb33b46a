//! Pause broadcast
//!
//! Sends one pause or unpause command to every router instance and reports
//! success only when all of them acknowledged. Every instance is attempted
//! even after another has failed; there are no retries.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use super::{dedupe_instances, OperationGuard};
use crate::discovery::{PeerDirectory, PeerInstance};
use crate::peer::{PauseCommand, PeerConnector};
use crate::types::{ControlError, PeerFailure, Result};

/// Instances that acknowledged a broadcast
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastReport {
    pub acknowledged: Vec<PeerInstance>,
}

#[derive(Clone)]
pub struct PauseBroadcaster {
    directory: PeerDirectory,
    connector: Arc<dyn PeerConnector>,
    discovery_timeout: Duration,
    request_timeout: Duration,
}

impl PauseBroadcaster {
    pub fn new(
        directory: PeerDirectory,
        connector: Arc<dyn PeerConnector>,
        discovery_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            connector,
            discovery_timeout,
            request_timeout,
        }
    }

    /// Deliver `cmd` to every instance of `service`
    ///
    /// Returns `AggregateFailure` naming each instance that did not
    /// acknowledge, in discovery order. A discovery failure is returned as-is
    /// and nothing is sent.
    pub async fn broadcast(&self, service: &str, cmd: &PauseCommand) -> Result<BroadcastReport> {
        self.broadcast_tracked(service, cmd, None).await
    }

    /// [`broadcast`](Self::broadcast), reporting progress through `operation`
    pub async fn broadcast_tracked(
        &self,
        service: &str,
        cmd: &PauseCommand,
        operation: Option<&OperationGuard>,
    ) -> Result<BroadcastReport> {
        let instances = dedupe_instances(self.directory.resolve(service, self.discovery_timeout).await?);
        let progress = operation.map(|op| {
            op.set_expected(instances.len());
            op.progress()
        });
        info!(
            service,
            kind = %cmd.target_kind,
            name = %cmd.target_name,
            paused = cmd.paused,
            peers = instances.len(),
            "Broadcasting pause command"
        );

        let attempts = instances.iter().map(|instance| {
            let client = self.connector.connect(instance);
            let limit = self.request_timeout;
            let progress = progress.clone();
            async move {
                let outcome = match tokio::time::timeout(limit, client.send_command(cmd)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ControlError::PeerUnreachable {
                        addr: instance.addr.clone(),
                        reason: format!("no acknowledgement within {:?}", limit),
                    }),
                };
                if let Some(progress) = progress {
                    progress.fetch_add(1, Ordering::Relaxed);
                }
                (instance, outcome)
            }
        });

        let mut acknowledged = Vec::new();
        let mut failures = Vec::new();
        for (instance, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => acknowledged.push(instance.clone()),
                Err(e) => {
                    warn!(peer = %instance.addr, error = %e, "Pause command not acknowledged");
                    failures.push(PeerFailure::new(instance.clone(), e));
                }
            }
        }

        if failures.is_empty() {
            info!(peers = acknowledged.len(), "Pause command acknowledged by every router");
            Ok(BroadcastReport { acknowledged })
        } else {
            Err(ControlError::AggregateFailure(failures))
        }
    }
}
