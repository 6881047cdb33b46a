//! Shared harness: fake routers, a fake router API, and a floodgate server,
//! all on ephemeral localhost ports.

#![allow(dead_code)]

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use floodgate::discovery::{ServiceDiscovery, StaticDiscovery};
use floodgate::peer::HttpPeerConnector;
use floodgate::router_api::HttpRouteBackend;
use floodgate::server::{self, BoxBody};
use floodgate::sse::{event_stream, EventSink, StreamEvent};
use floodgate::{AppState, Args};

fn full(status: StatusCode, body: impl Into<Bytes>) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(body.into()).map_err(|never| match never {}).boxed())
        .unwrap()
}

fn event_stream_response(body: BoxBody) -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .body(body)
        .unwrap()
}

/// Serve `handler` on an ephemeral port
pub async fn spawn_server<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<BoxBody>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler(req).await) }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    addr
}

/// An address nothing is listening on
pub async fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

// =============================================================================
// Fake router
// =============================================================================

#[derive(Clone)]
pub enum DrainMode {
    /// Send these data values, then end the response
    Frames(Vec<&'static str>),
    /// Send a progress frame, wait for the notify, then send completion
    Gated(Arc<Notify>),
    /// Send a progress frame and keep the stream open until the client leaves
    Hold,
    /// Answer with HTTP 500
    Fail,
}

#[derive(Clone)]
pub struct FakeRouter {
    pub mode: DrainMode,
    /// `(kind/name, paused)` for every pause command received
    pub pauses: Arc<Mutex<Vec<(String, bool)>>>,
    pub drains_opened: Arc<AtomicUsize>,
    pub drains_closed: Arc<AtomicUsize>,
}

impl FakeRouter {
    pub fn new(mode: DrainMode) -> Self {
        Self {
            mode,
            pauses: Arc::new(Mutex::new(Vec::new())),
            drains_opened: Arc::new(AtomicUsize::new(0)),
            drains_closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn spawn(&self) -> String {
        let router = self.clone();
        spawn_server(move |req| {
            let router = router.clone();
            async move { router.handle(req).await }
        })
        .await
        .to_string()
    }

    pub fn pauses(&self) -> Vec<(String, bool)> {
        self.pauses.lock().unwrap().clone()
    }

    async fn handle(&self, req: Request<Incoming>) -> Response<BoxBody> {
        let path = req.uri().path().to_string();
        let segments: Vec<String> = path.trim_matches('/').split('/').map(String::from).collect();

        match (req.method().clone(), segments.len()) {
            (Method::PUT, 3) if segments[0] == "services" => {
                let body = req.into_body().collect().await.unwrap().to_bytes();
                let value: Value = serde_json::from_slice(&body).unwrap();
                let paused = value["paused"].as_bool().unwrap();
                self.pauses
                    .lock()
                    .unwrap()
                    .push((format!("{}/{}", segments[1], segments[2]), paused));
                full(StatusCode::OK, "")
            }
            (Method::GET, 4) if segments[0] == "services" && segments[3] == "drain" => self.drain(),
            _ => full(StatusCode::NOT_FOUND, ""),
        }
    }

    fn drain(&self) -> Response<BoxBody> {
        self.drains_opened.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            DrainMode::Fail => full(StatusCode::INTERNAL_SERVER_ERROR, "drain failed"),
            DrainMode::Frames(values) => {
                let body: String = values.iter().map(|v| format!("data: {}\n\n", v)).collect();
                event_stream_response(Full::new(Bytes::from(body)).map_err(|never| match never {}).boxed())
            }
            DrainMode::Gated(gate) => {
                let gate = gate.clone();
                let (mut encoder, body) = event_stream(4);
                tokio::spawn(async move {
                    let _ = encoder.send_event(&StreamEvent::new("connections=1")).await;
                    gate.notified().await;
                    let _ = encoder.send_event(&StreamEvent::completion()).await;
                });
                event_stream_response(body.map_err(|never| match never {}).boxed())
            }
            DrainMode::Hold => {
                let closed = self.drains_closed.clone();
                let (mut encoder, body) = event_stream(4);
                tokio::spawn(async move {
                    let _ = encoder.send_event(&StreamEvent::new("connections=5")).await;
                    encoder.closed().await;
                    closed.fetch_add(1, Ordering::SeqCst);
                });
                event_stream_response(body.map_err(|never| match never {}).boxed())
            }
        }
    }
}

// =============================================================================
// Fake router API (route records)
// =============================================================================

#[derive(Clone, Default)]
pub struct FakeRouteApi {
    pub routes: Arc<Mutex<Vec<Value>>>,
}

impl FakeRouteApi {
    pub async fn spawn(&self) -> SocketAddr {
        let api = self.clone();
        spawn_server(move |req| {
            let api = api.clone();
            async move { api.handle(req).await }
        })
        .await
    }

    async fn handle(&self, req: Request<Incoming>) -> Response<BoxBody> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or("").to_string();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            (Method::POST, ["routes"]) => {
                let body = req.into_body().collect().await.unwrap().to_bytes();
                let mut route: Value = serde_json::from_slice(&body).unwrap();
                let mut routes = self.routes.lock().unwrap();
                route["id"] = json!(format!("r{}", routes.len() + 1));
                routes.push(route.clone());
                full(StatusCode::OK, route.to_string())
            }
            (Method::GET, ["routes"]) => {
                let parent_ref = query
                    .strip_prefix("parent_ref=")
                    .unwrap_or("")
                    .replace("%2F", "/");
                let routes: Vec<Value> = self
                    .routes
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|r| r["parent_ref"] == parent_ref.as_str())
                    .cloned()
                    .collect();
                full(StatusCode::OK, Value::from(routes).to_string())
            }
            (Method::GET, ["routes", route_type, id]) => match self.find(route_type, id) {
                Some(route) => full(StatusCode::OK, route.to_string()),
                None => full(StatusCode::NOT_FOUND, r#"{"error":"not_found"}"#),
            },
            (Method::DELETE, ["routes", route_type, id]) => {
                let mut routes = self.routes.lock().unwrap();
                let before = routes.len();
                routes.retain(|r| !(r["type"] == *route_type && r["id"] == *id));
                if routes.len() < before {
                    full(StatusCode::OK, "")
                } else {
                    full(StatusCode::NOT_FOUND, r#"{"error":"not_found"}"#)
                }
            }
            _ => full(StatusCode::NOT_FOUND, ""),
        }
    }

    fn find(&self, route_type: &str, id: &str) -> Option<Value> {
        self.routes
            .lock()
            .unwrap()
            .iter()
            .find(|r| r["type"] == route_type && r["id"] == id)
            .cloned()
    }
}

// =============================================================================
// Floodgate under test
// =============================================================================

pub struct Floodgate {
    pub base: String,
    pub state: Arc<AppState>,
    pub client: reqwest::Client,
}

impl Floodgate {
    pub async fn start(discovery: Arc<dyn ServiceDiscovery>, route_api: Option<SocketAddr>, extra_args: &[&str]) -> Self {
        let mut argv = vec![
            "floodgate".to_string(),
            "--discovery-timeout-ms".to_string(),
            "500".to_string(),
            "--peer-request-timeout-ms".to_string(),
            "2000".to_string(),
        ];
        if let Some(api) = route_api {
            argv.push("--router-api-url".to_string());
            argv.push(format!("http://{}", api));
        }
        argv.extend(extra_args.iter().map(|a| a.to_string()));
        let args = Args::try_parse_from(argv).unwrap();

        let http_client = reqwest::Client::new();
        let connector = Arc::new(HttpPeerConnector::new(http_client.clone(), args.peer_request_timeout()));
        let backend = Arc::new(HttpRouteBackend::new(args.router_api_url.clone(), http_client));
        let state = Arc::new(AppState::with_collaborators(args, discovery, connector, backend));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server::serve(listener, Arc::clone(&state)));

        Self {
            base: format!("http://{}", addr),
            state,
            client: reqwest::Client::new(),
        }
    }

    /// Floodgate over a fixed router list
    pub async fn with_routers(addrs: Vec<String>) -> Self {
        Self::start(Arc::new(StaticDiscovery::new(addrs)), None, &[]).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Poll `check` until it holds or `limit` passes
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
