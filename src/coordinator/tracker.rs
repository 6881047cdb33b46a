//! In-flight operation tracking
//!
//! Every pause and drain registers itself for the lifetime of its request so
//! `/status` can report what the control plane is currently doing. Entries
//! are removed by [`OperationGuard`] on drop, including when a caller
//! disconnects mid-drain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Pause,
    Unpause,
    Drain,
}

/// Point-in-time view of one operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationSnapshot {
    pub id: Uuid,
    pub kind: OperationKind,
    /// `kind/name` of the service being acted on
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub expected_peers: usize,
    pub settled_peers: usize,
}

struct OperationRecord {
    kind: OperationKind,
    target: String,
    started_at: DateTime<Utc>,
    expected: AtomicUsize,
    settled: Arc<AtomicUsize>,
}

/// Registry of in-flight operations
#[derive(Default)]
pub struct OperationTracker {
    operations: DashMap<Uuid, OperationRecord>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation; it stays listed until the guard is dropped
    pub fn register(self: &Arc<Self>, kind: OperationKind, target: impl Into<String>) -> OperationGuard {
        let id = Uuid::new_v4();
        let settled = Arc::new(AtomicUsize::new(0));
        let target = target.into();
        debug!(%id, ?kind, target = %target, "Operation started");
        self.operations.insert(
            id,
            OperationRecord {
                kind,
                target,
                started_at: Utc::now(),
                expected: AtomicUsize::new(0),
                settled: settled.clone(),
            },
        );
        OperationGuard {
            id,
            tracker: self.clone(),
            settled,
        }
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<OperationSnapshot> {
        let mut operations: Vec<_> = self
            .operations
            .iter()
            .map(|entry| OperationSnapshot {
                id: *entry.key(),
                kind: entry.kind,
                target: entry.target.clone(),
                started_at: entry.started_at,
                expected_peers: entry.expected.load(Ordering::Relaxed),
                settled_peers: entry.settled.load(Ordering::Relaxed),
            })
            .collect();
        operations.sort_by_key(|op| op.started_at);
        operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Keeps an operation listed while alive
pub struct OperationGuard {
    id: Uuid,
    tracker: Arc<OperationTracker>,
    settled: Arc<AtomicUsize>,
}

impl OperationGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn set_expected(&self, peers: usize) {
        if let Some(record) = self.tracker.operations.get(&self.id) {
            record.expected.store(peers, Ordering::Relaxed);
        }
    }

    /// Counter the operation updates as peers settle
    pub fn progress(&self) -> Arc<AtomicUsize> {
        self.settled.clone()
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        if self.tracker.operations.remove(&self.id).is_some() {
            debug!(id = %self.id, "Operation finished");
        }
    }
}
