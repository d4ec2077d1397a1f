//! Shutdown coordination for the embedded server.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// The controller thread triggers; the server's tokio tasks subscribe. The
/// channel holds one message, so a trigger sent before a subscriber starts
/// awaiting is not lost.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Returns whether anyone was listening.
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }

    /// Number of subscribers still alive.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once `rx` sees the signal or the sender is gone.
pub async fn signalled(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}
