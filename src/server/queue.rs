//! Bounded FIFO hand-off between the acceptor and the workers.
//!
//! The acceptor owns the single `QueueSender`; every worker holds a clone
//! of the `QueueReceiver`. The receiving half sits behind a mutex, so
//! idle workers wait their turn on the lock and then on the channel, and
//! nobody spins.
//!
//! Dropping the sender closes the queue. Items already queued are still
//! handed out; `pop` returns `None` only once the queue is both closed and
//! empty.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

/// Creates a queue holding at most `capacity` items.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        QueueSender { tx },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Returned by `push` when every receiver is gone; carries the item back.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueClosed<T>(pub T);

pub struct QueueSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> QueueSender<T> {
    /// Appends `item`, waiting while the queue is full.
    pub async fn push(&self, item: T) -> Result<(), QueueClosed<T>> {
        self.tx.send(item).await.map_err(|e| QueueClosed(e.0))
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

pub struct QueueReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> QueueReceiver<T> {
    /// Removes the oldest item, waiting while the queue is empty.
    pub async fn pop(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}
