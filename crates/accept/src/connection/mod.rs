//! Accepted-connection wrapper with lazy PROXY header stripping.
//!
//! # Components
//!
//! - [`ProxyConnection`]: wraps one accepted stream; on first use it runs a
//!   one-shot detection state machine that recognizes PROXY protocol v1 or v2,
//!   extracts the original endpoints, and otherwise passes bytes through
//!   unmodified
//!
//! # Detection lifecycle
//!
//! ```text
//!        Pending ──┬── Passthrough   (no header present, nothing consumed)
//!                  ├── TimedOut      (deadline elapsed, same as Passthrough)
//!                  ├── Proxied       (endpoints extracted, header stripped)
//!                  └── Failed        (terminal error, connection unusable)
//! ```
//!
//! The transition fires exactly once, triggered by whichever of read /
//! [`peer_addr`](ProxyConnection::peer_addr) /
//! [`local_addr`](ProxyConnection::local_addr) runs first; every later call
//! observes the same outcome without touching the wire again.

mod proxy_connection;

pub use proxy_connection::ProxyConnection;
