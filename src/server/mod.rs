//! HTTP server for floodgate

pub mod http;

pub use http::{run, serve, AppState, BoxBody};
