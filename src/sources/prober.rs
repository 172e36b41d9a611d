//! Active source health probing.
//!
//! # Responsibilities
//! - Periodically ping every source
//! - Feed latency and outcome into the same smoothed health fields that
//!   live requests update
//! - Declare a source offline only after explicit unreachability persists
//!   across its configured retry attempts

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::config::schema::HealthProbeConfig;
use crate::sources::client::UpstreamError;
use crate::sources::registry::SourceRegistry;
use crate::sources::source::Source;

pub struct SourceProber {
    sources: Arc<SourceRegistry>,
    config: HealthProbeConfig,
}

impl SourceProber {
    pub fn new(sources: Arc<SourceRegistry>, config: HealthProbeConfig) -> Self {
        Self { sources, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Source health probing disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            sources = self.sources.all().len(),
            "Source prober starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Source prober received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&self) {
        for source in self.sources.all() {
            self.probe_source(source).await;
        }
    }

    async fn probe_source(&self, source: &Arc<Source>) {
        let timeout = Duration::from_millis(source.config().timeout_ms);
        let attempts = source.config().retry_attempts.max(1);
        let client = source.client();

        let mut unreachable = false;
        let mut latency = Duration::ZERO;
        let mut succeeded = false;

        for attempt in 1..=attempts {
            let started = Instant::now();
            match time::timeout(timeout, client.ping()).await {
                Ok(Ok(())) => {
                    latency = started.elapsed();
                    succeeded = true;
                    break;
                }
                Ok(Err(UpstreamError::Unreachable(reason))) => {
                    latency = started.elapsed();
                    unreachable = true;
                    tracing::debug!(
                        source = %source.name(),
                        attempt,
                        %reason,
                        "Probe could not reach source"
                    );
                }
                Ok(Err(error)) => {
                    latency = started.elapsed();
                    unreachable = false;
                    tracing::debug!(source = %source.name(), attempt, %error, "Probe failed");
                }
                Err(_) => {
                    latency = timeout;
                    unreachable = false;
                    tracing::debug!(source = %source.name(), attempt, "Probe timed out");
                }
            }
        }

        if succeeded {
            source.mark_reachable();
            source.record_outcome(true, latency);
        } else {
            source.record_outcome(false, latency);
            if unreachable {
                source.mark_offline();
            }
        }
    }
}
