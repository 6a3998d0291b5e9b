//! `queue` crate — trigger event ingestion.
//!
//! External event sources publish [`TriggerEvent`]s into a bounded channel;
//! the engine's dispatcher drains it and starts one run per matching active
//! workflow.

pub mod error;
pub mod event;

pub use error::QueueError;
pub use event::TriggerEvent;

use tokio::sync::mpsc;
use tracing::debug;

/// Default number of events buffered before publishers are back-pressured.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Create a bounded event queue.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, EventReceiver { rx })
}

/// Publishing half of the queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<TriggerEvent>,
}

impl EventSender {
    /// Enqueue an event, waiting for capacity if the queue is full.
    ///
    /// # Errors
    /// [`QueueError::Closed`] once the receiving side has been dropped.
    pub async fn publish(&self, event: TriggerEvent) -> Result<(), QueueError> {
        debug!(trigger_type = %event.trigger_type, "publishing trigger event");
        self.tx.send(event).await.map_err(|_| QueueError::Closed)
    }

    /// Enqueue an event without waiting.
    ///
    /// # Errors
    /// [`QueueError::Full`] when the buffer is full, [`QueueError::Closed`]
    /// once the receiver is gone.
    pub fn try_publish(&self, event: TriggerEvent) -> Result<(), QueueError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

/// Consuming half of the queue.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<TriggerEvent>,
}

impl EventReceiver {
    /// Wait for the next event. Returns `None` once every sender is dropped
    /// and the buffer is drained.
    pub async fn recv(&mut self) -> Option<TriggerEvent> {
        self.rx.recv().await
    }
}
