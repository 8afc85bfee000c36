//! Fixed-size worker pool.
//!
//! Each worker loops: pop an item, run the handler to completion, repeat.
//! The handler runs in a child task that the worker awaits, so a panic
//! ends that one item only and the worker carries on. With `size`
//! workers there are never more than `size` handlers running.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::server::queue::QueueReceiver;

pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `size` workers sharing `queue`.
    pub fn spawn<T, F, Fut>(size: usize, queue: QueueReceiver<T>, handler: F) -> Self
    where
        T: Send + 'static,
        F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let workers = (0..size)
            .map(|id| tokio::spawn(worker_loop(id, queue.clone(), handler.clone())))
            .collect();

        tracing::debug!(workers = size, "worker pool started");
        Self { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every worker to exit, which happens once the queue is
    /// closed and drained.
    pub async fn join(self) {
        for (id, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                tracing::error!(worker = id, error = %e, "worker task failed");
            }
        }
    }
}

async fn worker_loop<T, F, Fut>(id: usize, queue: QueueReceiver<T>, handler: F)
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    while let Some(item) = queue.pop().await {
        if let Err(e) = tokio::spawn(handler(item)).await {
            tracing::error!(worker = id, error = %e, "connection handler panicked");
        }
    }
    tracing::debug!(worker = id, "queue closed, worker exiting");
}
