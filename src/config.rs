//! Server configuration.
//!
//! Values come from three layers, lowest precedence first: built-in
//! defaults, an optional YAML file, then command line flags (which fall
//! back to `TORERO_*` environment variables where noted).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::error::StartupError;

/// Immutable server settings shared by the acceptor and every worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub document_root: PathBuf,
    pub backlog: u32,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub idle_timeout_ms: u64,
    pub max_request_bytes: usize,
    pub keep_alive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            document_root: PathBuf::from("."),
            backlog: 10,
            worker_count: 8,
            queue_capacity: 64,
            idle_timeout_ms: 5_000,
            max_request_bytes: 8 * 1024,
            keep_alive: true,
        }
    }
}

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "torero-serve", version, about = "Serve static files and directory listings over HTTP/1.x")]
pub struct Cli {
    /// Port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Directory to serve files from
    pub document_root: PathBuf,

    /// YAML file with additional settings
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Interface address to bind
    #[arg(long, env = "TORERO_BIND")]
    pub bind: Option<IpAddr>,

    /// Number of worker tasks serving connections
    #[arg(long, env = "TORERO_WORKERS")]
    pub workers: Option<usize>,

    /// Kernel listen backlog
    #[arg(long)]
    pub backlog: Option<u32>,

    /// Connections allowed to wait for a free worker
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Milliseconds allowed to receive a complete request head
    #[arg(long, env = "TORERO_IDLE_TIMEOUT_MS")]
    pub idle_timeout_ms: Option<u64>,

    /// Largest accepted request, in bytes
    #[arg(long)]
    pub max_request_bytes: Option<usize>,

    /// Close every connection after one response
    #[arg(long)]
    pub no_keep_alive: bool,

    /// Log at debug level
    #[arg(long, short)]
    pub verbose: bool,
}

impl ServerConfig {
    /// Reads settings from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, StartupError> {
        let text = std::fs::read_to_string(path).map_err(|source| StartupError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|source| StartupError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Builds the effective configuration from parsed arguments, then
    /// validates it.
    pub fn from_cli(cli: &Cli) -> Result<Self, StartupError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };

        config.port = cli.port;
        config.document_root = cli.document_root.clone();
        if let Some(bind) = cli.bind {
            config.bind_address = bind;
        }
        if let Some(workers) = cli.workers {
            config.worker_count = workers;
        }
        if let Some(backlog) = cli.backlog {
            config.backlog = backlog;
        }
        if let Some(capacity) = cli.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(timeout) = cli.idle_timeout_ms {
            config.idle_timeout_ms = timeout;
        }
        if let Some(limit) = cli.max_request_bytes {
            config.max_request_bytes = limit;
        }
        if cli.no_keep_alive {
            config.keep_alive = false;
        }

        config.validate()
    }

    /// Checks limits and canonicalizes the document root.
    ///
    /// The returned config's `document_root` is absolute with symlinks
    /// resolved; path resolution compares against it.
    pub fn validate(mut self) -> Result<Self, StartupError> {
        require_non_zero("worker_count", self.worker_count as u64)?;
        require_non_zero("queue_capacity", self.queue_capacity as u64)?;
        require_non_zero("backlog", u64::from(self.backlog))?;
        require_non_zero("idle_timeout_ms", self.idle_timeout_ms)?;
        require_non_zero("max_request_bytes", self.max_request_bytes as u64)?;

        let root = std::fs::canonicalize(&self.document_root).map_err(|source| {
            StartupError::RootMissing {
                path: self.document_root.clone(),
                source,
            }
        })?;
        if !root.is_dir() {
            return Err(StartupError::RootNotDirectory(root));
        }
        std::fs::read_dir(&root).map_err(|source| StartupError::RootUnreadable {
            path: root.clone(),
            source,
        })?;

        self.document_root = root;
        Ok(self)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

fn require_non_zero(name: &'static str, value: u64) -> Result<(), StartupError> {
    if value == 0 {
        return Err(StartupError::InvalidSetting {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
