use std::io::{self, ErrorKind};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::http::response::{Body, Response};
use crate::http::transport::Transport;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Chunk size used when streaming file bodies.
const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// Serializes the status line and headers, including the blank line.
pub fn serialize_head(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Writes one response, consuming it.
pub struct ResponseWriter {
    response: Response,
}

impl ResponseWriter {
    pub fn new(response: Response) -> Self {
        Self { response }
    }

    /// Sends the head and then the body.
    ///
    /// An in-memory body goes out together with the head. A file body is
    /// read and sent chunk by chunk; if the file yields fewer bytes than
    /// its declared length the response cannot be completed and an
    /// `UnexpectedEof` error is returned.
    pub async fn write_to<S>(self, transport: &mut Transport<S>) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut head = serialize_head(&self.response);

        match self.response.body {
            Body::Empty => transport.send_all(&head).await?,
            Body::Bytes(bytes) => {
                head.extend_from_slice(&bytes);
                transport.send_all(&head).await?;
            }
            Body::File { mut file, len } => {
                transport.send_all(&head).await?;

                let mut chunk = vec![0u8; FILE_CHUNK_SIZE];
                let mut remaining = len;
                while remaining > 0 {
                    let want = remaining.min(FILE_CHUNK_SIZE as u64) as usize;
                    let n = file.read(&mut chunk[..want]).await?;
                    if n == 0 {
                        return Err(io::Error::new(
                            ErrorKind::UnexpectedEof,
                            "file shrank while it was being sent",
                        ));
                    }
                    transport.send_all(&chunk[..n]).await?;
                    remaining -= n as u64;
                }
            }
        }

        transport.flush().await
    }
}
