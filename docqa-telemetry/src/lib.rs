//! Logging setup for docqa.
//!
//! Every crate in the workspace logs through `tracing`; this crate installs
//! the subscriber. Filtering follows `RUST_LOG` and defaults to `info`.
//!
//! ```rust,ignore
//! docqa_telemetry::init_telemetry("docqa")?;
//! ```
//!
//! Tests use [`capture_subscriber`] to record events in memory and assert
//! on what was logged.

pub mod memory;

pub use memory::{InMemoryLogLayer, LogRecord, SharedLogStorage};

use tracing::Subscriber;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a human-readable subscriber as the global default.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_telemetry(service_name: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .try_init()?;
    tracing::info!(service.name = service_name, "telemetry initialized");
    Ok(())
}

/// Install a subscriber that writes one JSON object per line, for log shipping.
pub fn init_json(service_name: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_current_span(true).with_span_list(false))
        .try_init()?;
    tracing::info!(service.name = service_name, "telemetry initialized");
    Ok(())
}

/// Install the human-readable subscriber plus an in-memory copy of every event.
pub fn init_with_storage(service_name: &str, storage: SharedLogStorage) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .with(InMemoryLogLayer::new(storage))
        .try_init()?;
    tracing::info!(service.name = service_name, "telemetry initialized");
    Ok(())
}

/// A subscriber that records every event, at every level, into `storage`.
///
/// Not installed globally; scope it with `tracing::subscriber::set_default`
/// or `with_default`.
pub fn capture_subscriber(storage: SharedLogStorage) -> impl Subscriber + Send + Sync {
    Registry::default().with(InMemoryLogLayer::new(storage))
}

#[cfg(test)]
mod test_inmemory;
