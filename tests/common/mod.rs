#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use torero_serve::config::ServerConfig;
use torero_serve::server::Server;

/// Builds a validated config serving `root` on an ephemeral loopback port.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1".parse().unwrap(),
        port: 0,
        document_root: root.to_path_buf(),
        worker_count: 2,
        queue_capacity: 4,
        idle_timeout_ms: 2_000,
        ..ServerConfig::default()
    }
    .validate()
    .unwrap()
}

/// Creates a document root with a few files and a subdirectory.
pub fn sample_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>home</h1>\n").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "plain text notes\n").unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs").join("a b.txt"), "spaced").unwrap();
    dir
}

pub struct RunningServer {
    pub addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl RunningServer {
    pub async fn start(config: ServerConfig) -> Self {
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));
        Self {
            addr,
            stop: Some(stop),
            handle,
        }
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not shut down")
            .unwrap()
            .unwrap();
    }
}

/// A parsed response as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parses one response from the front of `buf`, using Content-Length to
/// find the end of the body. Returns the response and bytes consumed.
pub fn parse_response(buf: &[u8], head_only: bool) -> Option<(RawResponse, usize)> {
    let head_end = buf.windows(4).position(|w| w == b"\r\n\r\n")?;
    let head = std::str::from_utf8(&buf[..head_end]).unwrap();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap();
    let status = status_line.split(' ').nth(1).unwrap().parse().unwrap();
    let headers: Vec<(String, String)> = lines
        .map(|line| {
            let (k, v) = line.split_once(':').unwrap();
            (k.trim().to_string(), v.trim().to_string())
        })
        .collect();

    let body_start = head_end + 4;
    let len: usize = if head_only {
        0
    } else {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
            .map(|(_, v)| v.parse().unwrap())
            .unwrap_or(0)
    };
    if buf.len() < body_start + len {
        return None;
    }
    let response = RawResponse {
        status,
        headers,
        body: buf[body_start..body_start + len].to_vec(),
    };
    Some((response, body_start + len))
}

/// Sends `request` on a fresh connection and reads until the server closes.
pub async fn roundtrip(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut out))
        .await
        .expect("server did not close the connection")
        .unwrap();
    out
}

/// Sends `request` and parses the single response that comes back.
pub async fn fetch(addr: SocketAddr, request: &str) -> RawResponse {
    let head_only = request.starts_with("HEAD ");
    let raw = roundtrip(addr, request.as_bytes()).await;
    parse_response(&raw, head_only).expect("incomplete response").0
}
