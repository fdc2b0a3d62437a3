//! The connection-acceptance layer of an asynchronous HTTP server
//!
//! This crate provides a TCP listener that accepts raw connections and
//! optionally recognizes and strips a HAProxy PROXY protocol preamble - v1
//! (text) or v2 (binary) - before handing a clean byte-stream connection to
//! the application layer. It is built on tokio and focuses on handling
//! untrusted, possibly-slow, possibly-adversarial input safely: exactly-once
//! lazy parsing, deadline-bounded detection and strict binary field
//! validation.
//!
//! # Features
//!
//! - PROXY protocol v1 and v2 auto-detection at stream start
//! - Lossless passthrough for ordinary (non-PROXY) traffic
//! - Relayer allowlist: only trusted networks get their headers parsed,
//!   everyone else's bytes are never even peeked
//! - Deadline-bounded detection: silent peers degrade to passthrough, never
//!   to an error
//! - TCP keep-alive applied to every accepted connection
//! - No header *generation* - this crate only decodes inbound preambles
//!
//! # Example
//!
//! ```no_run
//! use proxy_accept::config::ProxyProtocolConfig;
//! use proxy_accept::listener::ProxyListener;
//! use tokio::io::AsyncReadExt;
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ProxyProtocolConfig { enabled: true, ..ProxyProtocolConfig::default() };
//!
//!     let listener = match ProxyListener::bind("127.0.0.1:8080", &config).await {
//!         Ok(listener) => listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind failed");
//!             return;
//!         }
//!     };
//!
//!     loop {
//!         let (mut conn, _socket_peer) = match listener.accept().await {
//!             Ok(accepted) => accepted,
//!             Err(e) => {
//!                 error!(cause = %e, "accept failed");
//!                 continue;
//!             }
//!         };
//!
//!         tokio::spawn(async move {
//!             // first use triggers the one-shot header detection
//!             match conn.peer_addr().await {
//!                 Ok(client) => info!(%client, "client connected"),
//!                 Err(e) => {
//!                     error!(cause = %e, "dropping connection");
//!                     return;
//!                 }
//!             }
//!             let mut buf = vec![0u8; 4096];
//!             // ... hand `conn` to the HTTP layer ...
//!             let _ = conn.read(&mut buf).await;
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`listener`]: accepting connections and gating detection per peer
//! - [`connection`]: the lazily-detecting connection wrapper
//! - [`codec`]: the two-format header decoding state machine
//! - [`protocol`]: shared types and the error taxonomy
//! - [`config`]: the configuration surface consumed from the enclosing server
//!
//! # Detection semantics
//!
//! Detection runs at most once per connection, triggered by the first read or
//! address query. Exactly one terminal outcome holds afterwards: passthrough
//! (no header, nothing consumed), timed out (identical to passthrough for the
//! caller), proxied (endpoints extracted, header stripped), or failed (the
//! connection is unusable and the error is re-reported on every access). No
//! bytes beyond the header itself are ever consumed; whatever follows it -
//! or whatever a non-PROXY peer sent - reaches the caller unmodified.
//!
//! # Limitations
//!
//! - No TLS termination and no HTTP parsing (those live above this layer)
//! - v2 TLV extensions are not accepted; the declared address-block length
//!   must exactly match the address family
//! - Maximum v1 header line: 107 bytes, per the protocol

pub mod codec;
pub mod config;
pub mod connection;
pub mod listener;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
