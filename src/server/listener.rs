use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::server::queue::QueueSender;

/// Pause after a failed accept (e.g. out of file descriptors) before
/// trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// An accepted connection waiting for a worker.
#[derive(Debug)]
pub struct PendingConnection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}

/// Binds the listening socket with `SO_REUSEADDR` and the configured
/// backlog.
pub fn bind(config: &ServerConfig) -> Result<TcpListener, StartupError> {
    let addr = config.listen_addr();
    let bind_err = |source: std::io::Error| StartupError::Bind { addr, source };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;

    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    let listener = socket.listen(config.backlog).map_err(bind_err)?;

    info!(
        address = %listener.local_addr().unwrap_or(addr),
        backlog = config.backlog,
        "Listening"
    );
    Ok(listener)
}

/// Accepts connections and queues them until `shutdown` resolves.
///
/// A full queue stalls this loop, which leaves further clients waiting in
/// the kernel backlog. On return the listener and the queue sender are
/// dropped, so the port is released and the workers see the queue close.
pub async fn accept_loop<F>(listener: TcpListener, queue: QueueSender<PendingConnection>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let accepted = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
                break;
            }
            res = listener.accept() => res,
        };

        match accepted {
            Ok((stream, peer)) => {
                tracing::debug!(%peer, free_slots = queue.available(), "Accepted connection");
                if queue.push(PendingConnection { stream, peer }).await.is_err() {
                    tracing::warn!("worker pool is gone, stopping acceptor");
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept connection");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}
