//! Application-scoped access to the router's route records
//!
//! Routes live in the routing backend; this module only scopes them to an
//! owning application. A route whose parent reference names another
//! application is reported exactly like a missing one.

pub mod http;

pub use http::HttpRouteBackend;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{ControlError, Result};

/// Parent reference stamped on every route owned by `app_id`
pub fn route_parent_ref(app_id: &str) -> String {
    format!("controller/apps/{}", app_id)
}

/// A route record
///
/// Only the fields floodgate acts on are typed; everything else is carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub route_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_ref: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// `{type}/{id}` address of a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteId {
    pub route_type: String,
    pub id: String,
}

impl RouteId {
    pub fn new(route_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            route_type: route_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.route_type, self.id)
    }
}

/// Routing backend holding route records
#[async_trait::async_trait]
pub trait RouteBackend: Send + Sync {
    async fn create_route(&self, route: Route) -> Result<Route>;

    /// `RouteNotFound` when no such route exists
    async fn get_route(&self, id: &RouteId) -> Result<Route>;

    async fn list_routes(&self, parent_ref: &str) -> Result<Vec<Route>>;

    async fn delete_route(&self, id: &RouteId) -> Result<()>;
}

/// Route operations on behalf of one application
#[derive(Clone)]
pub struct RouteService {
    backend: Arc<dyn RouteBackend>,
}

impl RouteService {
    pub fn new(backend: Arc<dyn RouteBackend>) -> Self {
        Self { backend }
    }

    pub async fn create(&self, app_id: &str, mut route: Route) -> Result<Route> {
        if route.route_type.trim().is_empty() {
            return Err(ControlError::BadRequest("route type is required".into()));
        }
        route.parent_ref = route_parent_ref(app_id);
        let created = self.backend.create_route(route).await?;
        info!(app = app_id, route_type = %created.route_type, id = %created.id, "Route created");
        Ok(created)
    }

    /// Fetch a route, hiding routes owned by other applications
    pub async fn get(&self, app_id: &str, id: &RouteId) -> Result<Route> {
        let route = self.backend.get_route(id).await?;
        if route.parent_ref != route_parent_ref(app_id) {
            debug!(app = app_id, route = %id, "Route belongs to another owner");
            return Err(ControlError::RouteNotFound);
        }
        Ok(route)
    }

    pub async fn list(&self, app_id: &str) -> Result<Vec<Route>> {
        self.backend.list_routes(&route_parent_ref(app_id)).await
    }

    /// Delete a route after confirming `app_id` owns it
    pub async fn delete(&self, app_id: &str, id: &RouteId) -> Result<()> {
        self.get(app_id, id).await?;
        self.backend.delete_route(id).await?;
        info!(app = app_id, route = %id, "Route deleted");
        Ok(())
    }
}
