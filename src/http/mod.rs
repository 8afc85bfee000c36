//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.0 and HTTP/1.1 server side of a
//! static file server, with support for keep-alive connections.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection request-response state machine
//! - **`transport`**: Complete sends and bounded receives over the socket
//! - **`parser`**: Parses incoming HTTP request heads from byte buffers
//! - **`request`**: HTTP request representation
//! - **`responder`**: Turns resolved resources and parse errors into responses
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serializes responses and streams file bodies
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │ AwaitingRequest  │ ← Wait for a complete request head
//!        └──────┬───────────┘
//!               │ Request (or parse error) ready; idle timeout → Closed
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Resolve path, build response
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │   Responding     │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → AwaitingRequest (same connection)
//!               └─ Close → Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use torero_serve::http::connection::Connection;
//!
//! let (socket, peer) = listener.accept().await?;
//! let mut conn = Connection::new(socket, peer, Arc::new(config));
//! conn.run().await?;
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod responder;
pub mod response;
pub mod transport;
pub mod writer;
