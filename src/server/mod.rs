//! Connection dispatch.
//!
//! One acceptor task feeds a bounded queue; a fixed pool of workers
//! drains it, each serving one connection at a time. Concurrency, open
//! sockets and buffered requests are therefore bounded by the worker
//! count plus the queue capacity, no matter how many clients connect.

pub mod listener;
pub mod pool;
pub mod queue;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::http::connection::Connection;
use crate::server::listener::PendingConnection;
use crate::server::pool::WorkerPool;

pub struct Server {
    config: Arc<ServerConfig>,
    listener: TcpListener,
}

impl Server {
    /// Binds the listening socket. `config` should already be validated.
    pub async fn bind(config: ServerConfig) -> Result<Self, StartupError> {
        let listener = listener::bind(&config)?;
        Ok(Self {
            config: Arc::new(config),
            listener,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until `shutdown` resolves, then stops accepting, lets the
    /// workers finish every queued and in-flight connection, and returns.
    ///
    /// Keep-alive ends with the shutdown: each open connection answers the
    /// request it is on with `Connection: close`, and idle ones are closed.
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let (sender, receiver) = queue::bounded(self.config.queue_capacity);

        let (stopping, stop_rx) = watch::channel(false);

        let config = Arc::clone(&self.config);
        let pool = WorkerPool::spawn(self.config.worker_count, receiver, move |conn| {
            serve_connection(conn, Arc::clone(&config), stop_rx.clone())
        });

        tracing::info!(
            workers = pool.size(),
            queue_capacity = self.config.queue_capacity,
            root = %self.config.document_root.display(),
            "Serving files"
        );

        listener::accept_loop(self.listener, sender, shutdown).await;
        stopping.send_replace(true);

        pool.join().await;
        tracing::info!("All connections drained, server stopped");
        Ok(())
    }
}

async fn serve_connection(
    pending: PendingConnection,
    config: Arc<ServerConfig>,
    stopping: watch::Receiver<bool>,
) {
    let PendingConnection { stream, peer } = pending;
    let mut conn = Connection::new(stream, peer, config).with_shutdown(stopping);
    if let Err(e) = conn.run().await {
        tracing::warn!(%peer, error = %e, "Connection aborted");
    }
}
