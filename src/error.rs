//! Startup error taxonomy.
//!
//! Anything in here is fatal: the process reports it and exits non-zero.
//! Per-connection failures never surface as one of these.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("document root {path} does not exist: {source}")]
    RootMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document root {0} is not a directory")]
    RootNotDirectory(PathBuf),

    #[error("document root {path} is not readable: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
