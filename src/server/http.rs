//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Drain responses are
//! streamed, so every handler returns a boxed body.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::Args;
use crate::coordinator::{DrainBarrier, OperationTracker, PauseBroadcaster};
use crate::discovery::{HttpDiscovery, PeerDirectory, ServiceDiscovery, StaticDiscovery};
use crate::peer::{HttpPeerConnector, PeerConnector};
use crate::router_api::{HttpRouteBackend, RouteBackend, RouteService};
use crate::routes;
use crate::types::{ControlError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Upper bound on establishing a TCP connection to a router or daemon
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Membership lookups for readiness
    pub directory: PeerDirectory,
    pub pause: PauseBroadcaster,
    pub drain: DrainBarrier,
    pub routes: RouteService,
    /// In-flight pause and drain operations
    pub operations: Arc<OperationTracker>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state with the HTTP-backed discovery, peer and route clients
    pub fn from_args(args: Args) -> Result<Self> {
        // No overall request timeout: drain streams stay open until peers finish
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ControlError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let discovery: Arc<dyn ServiceDiscovery> = match args.peer_addr_list() {
            Some(addrs) => {
                info!("Using fixed router list ({} addresses)", addrs.len());
                Arc::new(StaticDiscovery::new(addrs))
            }
            None => Arc::new(HttpDiscovery::new(args.discoverd_url.clone(), http_client.clone())),
        };
        let connector = Arc::new(HttpPeerConnector::new(
            http_client.clone(),
            args.peer_request_timeout(),
        ));
        let backend = Arc::new(HttpRouteBackend::new(args.router_api_url.clone(), http_client));

        Ok(Self::with_collaborators(args, discovery, connector, backend))
    }

    /// Build state around caller-supplied collaborators
    pub fn with_collaborators(
        args: Args,
        discovery: Arc<dyn ServiceDiscovery>,
        connector: Arc<dyn PeerConnector>,
        backend: Arc<dyn RouteBackend>,
    ) -> Self {
        let directory = PeerDirectory::new(discovery);
        let pause = PauseBroadcaster::new(
            directory.clone(),
            connector.clone(),
            args.discovery_timeout(),
            args.peer_request_timeout(),
        );
        let drain = DrainBarrier::new(directory.clone(), connector, args.drain_config());

        Self {
            args,
            directory,
            pause,
            drain,
            routes: RouteService::new(backend),
            operations: Arc::new(OperationTracker::new()),
            started_at: Utc::now(),
        }
    }
}

/// Bind the configured address and serve until the process exits
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Floodgate listening on {} as node {}",
        state.args.listen, state.args.node_id
    );
    info!(
        "Router service '{}', drain failure policy '{}'",
        state.args.router_service, state.args.drain_failure_policy
    );

    serve(listener, state).await
}

/// Accept loop over an already-bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        debug!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, segments.as_slice()) {
        // Liveness probe
        (Method::GET, ["health"]) | (Method::GET, ["healthz"]) => {
            to_boxed(routes::health_check(&state))
        }

        // Readiness probe - 200 only while the router service resolves
        (Method::GET, ["ready"]) | (Method::GET, ["readyz"]) => {
            to_boxed(routes::readiness_check(&state).await)
        }

        (Method::GET, ["version"]) => to_boxed(routes::version_info()),

        (Method::GET, ["status"]) => to_boxed(routes::status_check(&state)),

        // ====================================================================
        // Router tier control
        // ====================================================================
        (Method::PUT, ["services", kind, name]) => {
            to_boxed(routes::handle_pause(req, Arc::clone(&state), kind, name).await)
        }

        (Method::GET, ["services", kind, name, "drain"]) => {
            routes::handle_drain(Arc::clone(&state), kind, name).await
        }

        // ====================================================================
        // Application routes
        // ====================================================================
        (Method::POST, ["apps", app, "routes"]) => {
            to_boxed(routes::handle_create_route(req, &state, app).await)
        }

        (Method::GET, ["apps", app, "routes"]) => {
            to_boxed(routes::handle_list_routes(&state, app).await)
        }

        (Method::GET, ["apps", app, "routes", route_type, id]) => {
            to_boxed(routes::handle_get_route(&state, app, route_type, id).await)
        }

        (Method::DELETE, ["apps", app, "routes", route_type, id]) => {
            to_boxed(routes::handle_delete_route(&state, app, route_type, id).await)
        }

        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Convert a Full<Bytes> body to BoxBody
pub(crate) fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "not_found",
        "message": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
