//! Shutdown coordination for the background monitor loops.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// The breaker monitor, source prober, and degradation evaluator each
/// hold a receiver; triggering releases all of them at their next
/// `select!` poll. Nothing is aborted mid-call.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe a background loop to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Release every subscribed loop.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of loops still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
