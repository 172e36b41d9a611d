//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, file, remote)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Metric updates are cheap (facade macros over atomic recorders)
//! - The Prometheus exporter is opt-in; the library works without it

pub mod logging;
pub mod metrics;

use std::net::SocketAddr;

use crate::config::schema::ObservabilityConfig;

/// Initialize logging and, when enabled, the Prometheus endpoint.
///
/// For embedding applications that own their own subscriber or recorder,
/// skip this and call into [`logging`] / [`metrics`] directly.
pub fn init(config: &ObservabilityConfig) {
    logging::init(&config.log_level);
    if !config.metrics_enabled {
        return;
    }
    match config.metrics_address.parse::<SocketAddr>() {
        Ok(address) => {
            if let Err(error) = metrics::install_recorder(address) {
                tracing::warn!(%error, "Metrics recorder not installed");
            }
        }
        Err(_) => {
            tracing::warn!(address = %config.metrics_address, "Invalid metrics address");
        }
    }
}
