//! Floodgate - rolling drain and pause control for the router tier
//!
//! Every router instance registers with service discovery. Floodgate turns
//! one operator request into a fan-out across all of them:
//!
//! - **Pause**: `PUT /services/{kind}/{name}` is applied to every router,
//!   succeeding only if each one acknowledged it
//! - **Drain**: `GET /services/{kind}/{name}/drain` streams a single
//!   completion event once every router has drained the service
//! - **Routes**: application-scoped create/get/list/delete of route records

pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod logging;
pub mod peer;
pub mod router_api;
pub mod routes;
pub mod server;
pub mod sse;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{ControlError, Result};
