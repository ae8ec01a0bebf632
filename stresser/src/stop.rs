use std::sync::Arc;
use tokio::sync::watch;

/// Broadcast cancellation flag shared by a run.
///
/// Raising is idempotent and observing never consumes the signal, so any number of workers can
/// poll or await it.
#[derive(Clone, Debug)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once the signal is raised, immediately if it already is.
    pub async fn raised(&self) {
        let mut rx = self.tx.subscribe();
        // NOTE: `self` holds the sender so the channel cannot close underneath us.
        let _ = rx.wait_for(|raised| *raised).await;
    }
}
