//! Application route endpoints (`/apps/{app}/routes`)

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};

use super::{empty_response, error_response, json_response, read_json, require_segment};
use crate::router_api::{Route, RouteId};
use crate::server::AppState;
use crate::types::Result;

fn route_id(app: &str, route_type: &str, id: &str) -> Result<RouteId> {
    require_segment("app", app)?;
    require_segment("route type", route_type)?;
    require_segment("route id", id)?;
    Ok(RouteId::new(route_type, id))
}

/// Handle `POST /apps/{app}/routes`
pub async fn handle_create_route(
    req: Request<Incoming>,
    state: &AppState,
    app: &str,
) -> Response<Full<Bytes>> {
    if let Err(e) = require_segment("app", app) {
        return error_response(&e);
    }
    let route: Route = match read_json(req).await {
        Ok(route) => route,
        Err(e) => return error_response(&e),
    };

    match state.routes.create(app, route).await {
        Ok(route) => json_response(StatusCode::OK, &route),
        Err(e) => error_response(&e),
    }
}

/// Handle `GET /apps/{app}/routes`
pub async fn handle_list_routes(state: &AppState, app: &str) -> Response<Full<Bytes>> {
    if let Err(e) = require_segment("app", app) {
        return error_response(&e);
    }
    match state.routes.list(app).await {
        Ok(routes) => json_response(StatusCode::OK, &routes),
        Err(e) => error_response(&e),
    }
}

/// Handle `GET /apps/{app}/routes/{type}/{id}`
pub async fn handle_get_route(
    state: &AppState,
    app: &str,
    route_type: &str,
    id: &str,
) -> Response<Full<Bytes>> {
    let result = match route_id(app, route_type, id) {
        Ok(id) => state.routes.get(app, &id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(route) => json_response(StatusCode::OK, &route),
        Err(e) => error_response(&e),
    }
}

/// Handle `DELETE /apps/{app}/routes/{type}/{id}`
pub async fn handle_delete_route(
    state: &AppState,
    app: &str,
    route_type: &str,
    id: &str,
) -> Response<Full<Bytes>> {
    let result = match route_id(app, route_type, id) {
        Ok(id) => state.routes.delete(app, &id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => empty_response(StatusCode::OK),
        Err(e) => error_response(&e),
    }
}
