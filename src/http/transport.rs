//! Byte transport over a connected stream.
//!
//! A single read or write on a socket may move fewer bytes than asked
//! for. `send_all` hides that, and both directions retry interrupted
//! calls instead of reporting them.

use std::io::{self, ErrorKind};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub struct Transport<S> {
    stream: S,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Writes every byte of `bytes`, looping over partial writes.
    ///
    /// A write that accepts zero bytes means the peer is gone and is
    /// reported as `WriteZero`.
    pub async fn send_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            match self.stream.write(&bytes[written..]).await {
                Ok(0) => {
                    return Err(io::Error::new(
                        ErrorKind::WriteZero,
                        "connection closed while writing",
                    ));
                }
                Ok(n) => written += n,
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Appends between 1 and `max_bytes` bytes to `dest`.
    ///
    /// Returns 0 when the peer has closed its side; that is not an error.
    pub async fn receive_some(&mut self, dest: &mut BytesMut, max_bytes: usize) -> io::Result<usize> {
        let start = dest.len();
        dest.resize(start + max_bytes, 0);
        let result = loop {
            match self.stream.read(&mut dest[start..]).await {
                Err(e) if is_transient(&e) => continue,
                other => break other,
            }
        };
        let n = *result.as_ref().unwrap_or(&0);
        dest.truncate(start + n);
        result
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }

    /// Half-closes the write side so the peer sees end-of-stream.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock)
}
