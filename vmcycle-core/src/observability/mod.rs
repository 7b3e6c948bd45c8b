//! Observability infrastructure: tracing and metrics.
//!
//! Logs go to stderr so TAP output on stdout stays machine-readable.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Initialize the global tracing subscriber.
///
/// `default_level` is used when `RUST_LOG` is not set (e.g., "debug",
/// "vmcycle_core=trace").
pub fn init(default_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::try_new(default_level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .try_init()?;

    metrics::register_core_metrics();

    tracing::debug!(level = default_level, "Observability initialized");
    Ok(())
}
