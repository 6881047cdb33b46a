//! Fan-out / fan-in coordination across router instances
//!
//! ## Overview
//!
//! Both operations follow the same shape:
//! 1. Resolve the router service once (bounded wait, all-or-nothing)
//! 2. Dispatch one worker per instance, concurrently
//! 3. Aggregate every worker's outcome in the coordinating future
//! 4. Produce one result for the original caller
//!
//! The coordinating future is the only place outcomes are counted; workers
//! never touch shared counters.

pub mod barrier;
pub mod pause;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use barrier::{DrainBarrier, DrainConfig, DrainFailurePolicy, DrainOperation, DrainReport, DrainSession};
pub use pause::{BroadcastReport, PauseBroadcaster};
pub use tracker::{OperationGuard, OperationKind, OperationSnapshot, OperationTracker};

use std::collections::HashSet;

use tokio::task::AbortHandle;
use tracing::warn;

use crate::discovery::PeerInstance;

/// Drop duplicate addresses from a discovery snapshot, keeping the first
///
/// The barrier expects exactly one outcome per address, so a duplicate
/// would otherwise hold it open forever.
pub(crate) fn dedupe_instances(instances: Vec<PeerInstance>) -> Vec<PeerInstance> {
    let mut seen = HashSet::new();
    let total = instances.len();
    let unique: Vec<_> = instances
        .into_iter()
        .filter(|instance| seen.insert(instance.addr.clone()))
        .collect();
    if unique.len() != total {
        warn!(
            discovered = total,
            unique = unique.len(),
            "Discovery returned duplicate addresses"
        );
    }
    unique
}

/// Aborts every tracked task when dropped
#[derive(Default)]
pub(crate) struct WorkerGuard {
    handles: Vec<AbortHandle>,
}

impl WorkerGuard {
    pub(crate) fn track(&mut self, handle: AbortHandle) {
        self.handles.push(handle);
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
