//! Rolling drain barrier
//!
//! A drain is answered with exactly one completion event, sent only after
//! every router instance found at the start of the operation has reported
//! its own completion (or failed). Instances are drained in parallel; the
//! coordinator holds the only count of outcomes.
//!
//! ## Lifecycle
//!
//! 1. [`DrainBarrier::begin`] resolves membership. Failures here surface
//!    before the caller's response has started.
//! 2. [`DrainOperation::run`] spawns one worker per instance, waits for the
//!    barrier to release, and writes the completion event.
//! 3. Dropping the operation at any point aborts every outstanding worker,
//!    which closes its peer connection.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use super::{dedupe_instances, WorkerGuard};
use crate::discovery::{PeerDirectory, PeerInstance};
use crate::peer::{DrainRequest, PeerClient, PeerConnector};
use crate::sse::{EventSink, StreamEvent};
use crate::types::{ControlError, PeerFailure, Result};

/// What a failed peer means for the barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DrainFailurePolicy {
    /// A failed peer is counted as settled; completion is still sent
    #[default]
    Count,
    /// The first failed peer aborts the drain with an error
    Fail,
}

impl fmt::Display for DrainFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count => write!(f, "count"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Bound on the membership lookup
    pub discovery_timeout: Duration,
    /// Bound on one peer reaching completion; `None` waits indefinitely
    pub stream_timeout: Option<Duration>,
    pub failure_policy: DrainFailurePolicy,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(1),
            stream_timeout: Some(Duration::from_secs(600)),
            failure_policy: DrainFailurePolicy::Count,
        }
    }
}

/// Aggregate state of one drain
///
/// Tracks which instances are still pending. An outcome for an instance that
/// has already settled, or that was never part of the snapshot, is ignored;
/// so is anything arriving after completion.
#[derive(Debug)]
pub struct DrainSession {
    expected: usize,
    pending: HashSet<String>,
    drained: usize,
    failures: Vec<PeerFailure>,
    complete: bool,
}

impl DrainSession {
    pub fn new(instances: &[PeerInstance]) -> Self {
        let pending: HashSet<String> = instances.iter().map(|i| i.addr.clone()).collect();
        Self {
            expected: pending.len(),
            complete: pending.is_empty(),
            pending,
            drained: 0,
            failures: Vec::new(),
        }
    }

    /// Record one instance's outcome
    ///
    /// Returns `true` only for the outcome that completes the session.
    pub fn record(&mut self, instance: &PeerInstance, outcome: Result<()>) -> bool {
        if self.complete || !self.pending.remove(&instance.addr) {
            return false;
        }
        match outcome {
            Ok(()) => self.drained += 1,
            Err(e) => self.failures.push(PeerFailure::new(instance.clone(), e)),
        }
        if self.pending.is_empty() {
            self.complete = true;
            return true;
        }
        false
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Instances with a recorded outcome
    pub fn observed(&self) -> usize {
        self.expected - self.pending.len()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn into_report(self, target: String) -> DrainReport {
        DrainReport {
            target,
            expected: self.expected,
            drained: self.drained,
            failures: self.failures,
        }
    }
}

/// Result of a released barrier
#[derive(Debug, Clone)]
pub struct DrainReport {
    pub target: String,
    pub expected: usize,
    pub drained: usize,
    pub failures: Vec<PeerFailure>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Starts drains against the router tier
#[derive(Clone)]
pub struct DrainBarrier {
    directory: PeerDirectory,
    connector: Arc<dyn PeerConnector>,
    config: DrainConfig,
}

impl DrainBarrier {
    pub fn new(directory: PeerDirectory, connector: Arc<dyn PeerConnector>, config: DrainConfig) -> Self {
        Self {
            directory,
            connector,
            config,
        }
    }

    /// Resolve membership for a drain of `request` across `service`
    ///
    /// Nothing is dispatched yet; the returned operation fixes the instance
    /// snapshot every later step works against.
    pub async fn begin(&self, service: &str, request: DrainRequest) -> Result<DrainOperation> {
        let instances = dedupe_instances(
            self.directory
                .resolve(service, self.config.discovery_timeout)
                .await?,
        );
        info!(
            service,
            target = %request.target(),
            peers = instances.len(),
            "Starting drain"
        );
        Ok(DrainOperation {
            request,
            instances,
            connector: self.connector.clone(),
            config: self.config.clone(),
            progress: None,
        })
    }
}

/// A drain with its membership fixed, ready to run
pub struct DrainOperation {
    request: DrainRequest,
    instances: Vec<PeerInstance>,
    connector: Arc<dyn PeerConnector>,
    config: DrainConfig,
    progress: Option<Arc<AtomicUsize>>,
}

impl DrainOperation {
    pub fn expected(&self) -> usize {
        self.instances.len()
    }

    /// Mirror the settled-peer count into `counter` as outcomes arrive
    pub fn with_progress(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.progress = Some(counter);
        self
    }

    /// Wait for the barrier to release
    ///
    /// Under [`DrainFailurePolicy::Fail`] the first failed peer ends the wait
    /// with `AggregateFailure`; the remaining workers are aborted.
    pub async fn wait(self) -> Result<DrainReport> {
        let target = self.request.target();
        let mut session = DrainSession::new(&self.instances);
        if session.is_complete() {
            info!(target = %target, "No router instances, drain trivially complete");
            return Ok(session.into_report(target));
        }

        let mut workers = WorkerGuard::default();
        let mut outcomes = FuturesUnordered::new();
        for instance in &self.instances {
            let client = self.connector.connect(instance);
            let handle = tokio::spawn(drain_peer(
                client,
                instance.clone(),
                self.request.clone(),
                self.config.stream_timeout,
            ));
            workers.track(handle.abort_handle());
            let instance = instance.clone();
            outcomes.push(async move { (instance, handle.await) });
        }

        while let Some((instance, joined)) = outcomes.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Err(ControlError::Internal(format!("drain worker for {} ended: {}", instance.addr, e)))
            });

            match &outcome {
                Ok(()) => debug!(peer = %instance.addr, target = %target, "Peer drained"),
                Err(e) => {
                    warn!(peer = %instance.addr, target = %target, error = %e, "Peer failed to drain");
                    if self.config.failure_policy == DrainFailurePolicy::Fail {
                        return Err(ControlError::AggregateFailure(vec![PeerFailure::new(
                            instance,
                            e.clone(),
                        )]));
                    }
                }
            }

            let released = session.record(&instance, outcome);
            if let Some(progress) = &self.progress {
                progress.store(session.observed(), Ordering::Relaxed);
            }
            if released {
                break;
            }
        }
        drop(workers);

        if !session.is_complete() {
            return Err(ControlError::Internal(format!(
                "drain of {} ended with {} of {} peers settled",
                target,
                session.observed(),
                session.expected()
            )));
        }
        Ok(session.into_report(target))
    }

    /// Wait for the barrier, then write exactly one final event to `sink`
    ///
    /// On success that event is the completion marker. A failed write is
    /// logged, not returned: the barrier has already released.
    pub async fn run<S>(self, sink: &mut S) -> Result<DrainReport>
    where
        S: EventSink + ?Sized,
    {
        let target = self.request.target();
        match self.wait().await {
            Ok(report) => {
                if report.is_clean() {
                    info!(
                        target = %report.target,
                        expected = report.expected,
                        drained = report.drained,
                        "Drain complete"
                    );
                } else {
                    warn!(
                        target = %report.target,
                        expected = report.expected,
                        drained = report.drained,
                        failed = report.failures.len(),
                        "Drain complete with failed peers"
                    );
                }
                if let Err(e) = sink.send_event(&StreamEvent::completion()).await {
                    warn!(target = %target, error = %e, "Could not deliver drain completion");
                }
                Ok(report)
            }
            Err(err) => {
                let frame = StreamEvent::named("error", err.to_json().to_string());
                if let Err(e) = sink.send_event(&frame).await {
                    warn!(target = %target, error = %e, "Could not deliver drain failure");
                }
                Err(err)
            }
        }
    }
}

/// Consume one peer's drain stream until it reports completion
async fn drain_peer(
    client: Arc<dyn PeerClient>,
    instance: PeerInstance,
    request: DrainRequest,
    limit: Option<Duration>,
) -> Result<()> {
    let consume = async {
        let mut events = client.open_drain_stream(&request).await?;
        debug!(peer = %instance.addr, target = %request.target(), "Drain stream open");
        while let Some(event) = events.next().await {
            let event = event?;
            if event.is_completion() {
                return Ok(());
            }
            debug!(peer = %instance.addr, data = %event.data, "Drain progress");
        }
        Err(ControlError::Protocol {
            addr: instance.addr.clone(),
            reason: "stream closed before completion".to_string(),
        })
    };

    match limit {
        Some(limit) => tokio::time::timeout(limit, consume).await.unwrap_or_else(|_| {
            Err(ControlError::PeerUnreachable {
                addr: instance.addr.clone(),
                reason: format!("no completion within {:?}", limit),
            })
        }),
        None => consume.await,
    }
}
