//! In-memory router peers for coordinator tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;

use crate::discovery::{PeerDirectory, PeerInstance, StaticDiscovery};
use crate::peer::{DrainRequest, PauseCommand, PeerClient, PeerConnector};
use crate::sse::{EventSink, EventStream, StreamEvent};
use crate::types::{ControlError, Result};

/// How a fake peer answers
#[derive(Clone)]
pub(crate) enum Script {
    /// Acknowledge pauses; drain stream yields these data values then ends
    Events(Vec<&'static str>),
    /// Drain stream waits for one permit, then sends the completion marker
    Gated(Arc<Semaphore>),
    /// Connection refused for both calls
    Refuse,
    /// Pause answered with HTTP 500
    Reject,
    /// Never answers and never closes
    Hang,
}

/// Counts live drain connections; decrements when the stream is dropped
struct OpenConnection(Arc<AtomicUsize>);

impl OpenConnection {
    fn new(open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self(open)
    }
}

impl Drop for OpenConnection {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeRouters {
    scripts: HashMap<String, Script>,
    fallback: Script,
    pub open: Arc<AtomicUsize>,
    pub connects: AtomicUsize,
    pub commands: Arc<Mutex<Vec<(String, PauseCommand)>>>,
}

impl FakeRouters {
    pub fn new(fallback: Script) -> Self {
        Self {
            scripts: HashMap::new(),
            fallback,
            open: Arc::new(AtomicUsize::new(0)),
            connects: AtomicUsize::new(0),
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with(mut self, addr: &str, script: Script) -> Self {
        self.scripts.insert(addr.to_string(), script);
        self
    }

    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn command_addrs(&self) -> Vec<String> {
        let mut addrs: Vec<_> = self
            .commands
            .lock()
            .unwrap()
            .iter()
            .map(|(addr, _)| addr.clone())
            .collect();
        addrs.sort();
        addrs
    }
}

impl PeerConnector for FakeRouters {
    fn connect(&self, instance: &PeerInstance) -> Arc<dyn PeerClient> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(&instance.addr)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        Arc::new(FakeRouter {
            addr: instance.addr.clone(),
            script,
            open: self.open.clone(),
            commands: self.commands.clone(),
        })
    }
}

struct FakeRouter {
    addr: String,
    script: Script,
    open: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<(String, PauseCommand)>>>,
}

impl FakeRouter {
    fn refused(&self) -> ControlError {
        ControlError::PeerUnreachable {
            addr: self.addr.clone(),
            reason: "connection refused".into(),
        }
    }
}

#[async_trait::async_trait]
impl PeerClient for FakeRouter {
    async fn send_command(&self, cmd: &PauseCommand) -> Result<()> {
        self.commands
            .lock()
            .unwrap()
            .push((self.addr.clone(), cmd.clone()));
        match &self.script {
            Script::Refuse => Err(self.refused()),
            Script::Reject => Err(ControlError::PeerRejected {
                addr: self.addr.clone(),
                reason: "HTTP 500 Internal Server Error".into(),
            }),
            Script::Hang => std::future::pending().await,
            _ => Ok(()),
        }
    }

    async fn open_drain_stream(&self, _req: &DrainRequest) -> Result<EventStream> {
        let events: EventStream = match &self.script {
            Script::Refuse => return Err(self.refused()),
            Script::Events(values) => {
                stream::iter(values.clone().into_iter().map(|v| Ok(StreamEvent::new(v)))).boxed()
            }
            Script::Reject => stream::empty().boxed(),
            Script::Gated(gate) => {
                let gate = gate.clone();
                stream::once(async move {
                    if let Ok(permit) = gate.acquire().await {
                        permit.forget();
                    }
                    Ok(StreamEvent::completion())
                })
                .boxed()
            }
            Script::Hang => stream::pending().boxed(),
        };

        let connection = OpenConnection::new(self.open.clone());
        Ok(events
            .map(move |event| {
                let _held = &connection;
                event
            })
            .boxed())
    }
}

/// Discovery returning `count` addresses `10.0.0.{n}:5000`
pub(crate) fn directory(count: usize) -> PeerDirectory {
    PeerDirectory::new(Arc::new(StaticDiscovery::new(addrs(count))))
}

pub(crate) fn addrs(count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("10.0.0.{}:5000", n)).collect()
}

/// Sink that keeps every event it is given
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub events: Vec<StreamEvent>,
}

#[async_trait::async_trait]
impl EventSink for RecordingSink {
    async fn send_event(&mut self, event: &StreamEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

/// Sink whose caller has already gone away
pub(crate) struct ClosedSink;

#[async_trait::async_trait]
impl EventSink for ClosedSink {
    async fn send_event(&mut self, _event: &StreamEvent) -> Result<()> {
        Err(ControlError::CallerGone)
    }
}

/// Poll `check` until it holds or `limit` passes
pub(crate) async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
