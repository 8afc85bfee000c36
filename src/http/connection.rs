use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::time::timeout;

use crate::config::ServerConfig;
use crate::files;
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::Request;
use crate::http::responder;
use crate::http::response::Response;
use crate::http::transport::Transport;
use crate::http::writer::ResponseWriter;

/// Bytes requested from the socket per receive.
const READ_CHUNK: usize = 4096;

/// Upper bound on draining unread input before closing after an error
/// response, so the peer gets the response instead of a reset.
const LINGER_TIMEOUT: Duration = Duration::from_millis(500);
const LINGER_MAX_BYTES: usize = 64 * 1024;

pub struct Connection<S> {
    transport: Transport<S>,
    peer: SocketAddr,
    buffer: BytesMut,
    state: ConnectionState,
    config: Arc<ServerConfig>,
    linger: bool,
    shutdown: Option<watch::Receiver<bool>>,
    served: u64,
}

pub enum ConnectionState {
    AwaitingRequest,
    Processing(Result<Request, ParseError>),
    Responding(Response, bool), // bool = keep_alive?
    Closed,
}

enum ReadOutcome {
    Request(Request),
    Rejected(ParseError),
    PeerClosed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr, config: Arc<ServerConfig>) -> Self {
        Self {
            transport: Transport::new(stream),
            peer,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            state: ConnectionState::AwaitingRequest,
            config,
            linger: false,
            shutdown: None,
            served: 0,
        }
    }

    /// Stops keep-alive once `shutdown` reads `true`. The request in
    /// flight is still answered, with `Connection: close`, and a
    /// connection that has not been served yet still gets its first
    /// request handled.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Serves requests until the connection is closed.
    ///
    /// Returns an error only for transport faults; the stream is released
    /// when the `Connection` is dropped either way.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::AwaitingRequest => {
                    let idle = self.config.idle_timeout();
                    let between_requests = self.served > 0;
                    let shutdown = self.shutdown.clone();

                    let read = tokio::select! {
                        biased;
                        read = timeout(idle, self.read_request()) => read,
                        _ = shutdown_requested(shutdown), if between_requests => {
                            tracing::debug!(peer = %self.peer, "server shutting down, closing idle connection");
                            continue;
                        }
                    };

                    match read {
                        Err(_) => {
                            tracing::debug!(
                                peer = %self.peer,
                                buffered = self.buffer.len(),
                                "idle timeout, closing connection"
                            );
                        }
                        Ok(outcome) => {
                            let outcome = outcome
                                .with_context(|| format!("failed to receive from {}", self.peer))?;
                            self.state = match outcome {
                                ReadOutcome::Request(req) => ConnectionState::Processing(Ok(req)),
                                ReadOutcome::Rejected(err) => ConnectionState::Processing(Err(err)),
                                ReadOutcome::PeerClosed => ConnectionState::Closed,
                            };
                        }
                    }
                }

                ConnectionState::Processing(Ok(req)) => {
                    self.served += 1;
                    let response = self.handle_request(&req).await;
                    let keep_alive =
                        self.config.keep_alive && req.keep_alive() && !self.shutting_down();
                    self.state = ConnectionState::Responding(
                        responder::finalize(response, keep_alive),
                        keep_alive,
                    );
                }

                ConnectionState::Processing(Err(err)) => {
                    self.linger = true;
                    let response = responder::for_parse_error(&err);
                    tracing::info!(
                        peer = %self.peer,
                        method = "-",
                        path = "-",
                        status = response.status.as_u16(),
                        reason = %err,
                        "request rejected"
                    );
                    self.state =
                        ConnectionState::Responding(responder::finalize(response, false), false);
                }

                ConnectionState::Responding(response, keep_alive) => {
                    let status = response.status.as_u16();
                    let result = ResponseWriter::new(response)
                        .write_to(&mut self.transport)
                        .await;

                    match result {
                        Ok(()) if keep_alive => {
                            tracing::debug!(peer = %self.peer, "keeping connection alive");
                            self.state = ConnectionState::AwaitingRequest;
                        }
                        Ok(()) => {}
                        // Already reporting an error; nothing left to tell the peer.
                        Err(e) if status >= 400 => {
                            tracing::debug!(peer = %self.peer, status, error = %e, "error response not delivered");
                        }
                        Err(e) => {
                            return Err(e).with_context(|| {
                                format!("failed to send {} response to {}", status, self.peer)
                            });
                        }
                    }
                }

                ConnectionState::Closed => break,
            }
        }

        self.close().await;
        Ok(())
    }

    async fn handle_request(&self, req: &Request) -> Response {
        let root = self.config.document_root.clone();
        let target = req.target.clone();
        let method = req.method.clone();
        let response = responder::guarded(async move {
            let resource = files::resolve(&root, &target).await;
            responder::for_resource(resource, &method).await
        })
        .await;

        tracing::info!(
            peer = %self.peer,
            method = req.method.as_str(),
            path = %req.target,
            status = response.status.as_u16(),
            "request served"
        );

        response
    }

    async fn read_request(&mut self) -> io::Result<ReadOutcome> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer, self.config.max_request_bytes) {
                Ok((request, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(ReadOutcome::Request(request));
                }
                Err(ParseError::Incomplete) => {}
                Err(e) => return Ok(ReadOutcome::Rejected(e)),
            }

            let n = self
                .transport
                .receive_some(&mut self.buffer, READ_CHUNK)
                .await?;

            if n == 0 {
                if !self.buffer.is_empty() {
                    tracing::debug!(
                        peer = %self.peer,
                        buffered = self.buffer.len(),
                        "peer closed mid-request"
                    );
                }
                return Ok(ReadOutcome::PeerClosed);
            }
        }
    }

    /// Best-effort shutdown of the write side. After an error response the
    /// remaining input is drained for a short while first.
    async fn close(&mut self) {
        if self.transport.shutdown().await.is_err() || !self.linger {
            return;
        }

        let drain = async {
            let mut scratch = BytesMut::with_capacity(READ_CHUNK);
            let mut drained = 0;
            while drained < LINGER_MAX_BYTES {
                scratch.clear();
                match self.transport.receive_some(&mut scratch, READ_CHUNK).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => drained += n,
                }
            }
        };
        let _ = timeout(LINGER_TIMEOUT, drain).await;
    }
}

/// Resolves once shutdown has been signalled. Never resolves when there
/// is no signal to watch or its sender is gone.
async fn shutdown_requested(shutdown: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = shutdown {
        if rx.wait_for(|stop| *stop).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}
