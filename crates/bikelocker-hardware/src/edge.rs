//! Interrupt-side hand-off for limit switch edges.
//!
//! A switch bank calls [`EdgeNotifier::on_edge`] from its interrupt handler.
//! The call never blocks and never waits for the consumer: when the queue is
//! full the notification is dropped and counted, and the monitor task still
//! converges because it reads the pin level when it handles the next edge and
//! the interlock wait always confirms with a direct read.

use bikelocker_core::SwitchId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Producer half of the edge notification queue.
#[derive(Debug, Clone)]
pub struct EdgeNotifier {
    tx: mpsc::Sender<SwitchId>,
    dropped: Arc<AtomicU64>,
}

impl EdgeNotifier {
    /// Create a bounded edge queue.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, like [`mpsc::channel`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SwitchId>) {
        let (tx, rx) = mpsc::channel(capacity);
        let notifier = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (notifier, rx)
    }

    /// Queue an edge notification for `switch`.
    ///
    /// Returns `false` if the notification was not queued, either because the
    /// queue is full or because the monitor has gone away.
    pub fn on_edge(&self, switch: SwitchId) -> bool {
        match self.tx.try_send(switch) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Number of notifications dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the consuming monitor has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
