//! torero-serve - Concurrent static file server
//!
//! Core library for HTTP parsing, path resolution and connection dispatch.

pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod server;
