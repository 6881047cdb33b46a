//! Tracing subscriber setup
//!
//! `RUST_LOG` overrides the configured level when set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("floodgate={},info", level).into())
}

/// Install the global subscriber
pub fn init(level: &str, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(filter(level));
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}
