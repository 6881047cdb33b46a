//! Router API client for route records

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::{Route, RouteBackend, RouteId};
use crate::types::{ControlError, Result};

pub struct HttpRouteBackend {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpRouteBackend {
    pub fn new(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }

    fn routes_url(&self) -> String {
        format!("{}/routes", self.base_url)
    }

    fn route_url(&self, id: &RouteId) -> String {
        format!("{}/routes/{}/{}", self.base_url, id.route_type, id.id)
    }

    /// Send and map transport errors, 404 and other non-2xx answers
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| ControlError::Backend(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(ControlError::RouteNotFound),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ControlError::Backend(format!("router API returned {}: {}", status, body.trim())))
            }
        }
    }
}

#[async_trait::async_trait]
impl RouteBackend for HttpRouteBackend {
    async fn create_route(&self, route: Route) -> Result<Route> {
        debug!("POST {}", self.routes_url());
        let response = self
            .send(self.http_client.post(self.routes_url()).json(&route))
            .await?;
        response
            .json()
            .await
            .map_err(|e| ControlError::Backend(format!("invalid route: {e}")))
    }

    async fn get_route(&self, id: &RouteId) -> Result<Route> {
        let response = self.send(self.http_client.get(self.route_url(id))).await?;
        response
            .json()
            .await
            .map_err(|e| ControlError::Backend(format!("invalid route: {e}")))
    }

    async fn list_routes(&self, parent_ref: &str) -> Result<Vec<Route>> {
        let request = self
            .http_client
            .get(self.routes_url())
            .query(&[("parent_ref", parent_ref)]);
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ControlError::Backend(format!("invalid route list: {e}")))
    }

    async fn delete_route(&self, id: &RouteId) -> Result<()> {
        debug!("DELETE {}", self.route_url(id));
        self.send(self.http_client.delete(self.route_url(id))).await?;
        Ok(())
    }
}
