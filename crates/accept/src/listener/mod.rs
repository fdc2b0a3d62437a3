//! Connection acceptance and per-connection detection gating.
//!
//! # Components
//!
//! - [`ProxyListener`]: wraps a raw TCP listener; every accepted connection
//!   gets keep-alive applied, then is either wrapped for PROXY header
//!   detection or handed back as inert passthrough
//! - [`Allowlist`]: the set of relayer networks trusted to prepend a header,
//!   parsed once at construction
//!
//! # Gating rules
//!
//! A connection undergoes detection only when protocol support is enabled
//! *and* the allowlist is empty or contains the peer's IP. Everything else -
//! including peers sending spoofed-looking `PROXY` prefixes - is delivered
//! verbatim, bytes unpeeked.

mod allowlist;
pub use allowlist::Allowlist;

mod proxy_listener;
pub use proxy_listener::ProxyListener;
