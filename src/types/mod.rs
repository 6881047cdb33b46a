//! Shared types for floodgate

pub mod error;

pub use error::{ControlError, PeerFailure, Result};
