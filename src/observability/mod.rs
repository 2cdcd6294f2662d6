//! Observability module for the megaverse client.
//!
//! Diagnostics go through `tracing`; this module installs the subscriber
//! and provides a small metrics collector for call and object counts.

mod logging;
mod metrics;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use metrics::{DefaultMetricsCollector, MetricsCollector, MetricsSnapshot, NoopMetricsCollector};

use crate::errors::MegaverseResult;

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_tracing(format: LogFormat, level: LogLevel) -> MegaverseResult<()> {
    LoggingConfig::new()
        .with_format(format)
        .with_level(level)
        .init()
}
