use std::io;
use thiserror::Error;

/// Errors raised while constructing a [`ProxyListener`](crate::listener::ProxyListener).
///
/// Everything here is fatal for listener construction: either the socket could not
/// be bound or the configured relayer allowlist contains an entry that is neither
/// a plain IP nor a CIDR network.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to bind listener: {source}")]
    Bind {
        #[from]
        source: io::Error,
    },

    #[error("invalid relayer allowlist entry: {entry:?}")]
    InvalidAllowlistEntry { entry: String },
}

impl BindError {
    pub fn invalid_allowlist_entry<S: ToString>(entry: S) -> Self {
        Self::InvalidAllowlistEntry { entry: entry.to_string() }
    }
}

/// Errors raised while decoding a PROXY protocol header.
///
/// Every variant is terminal for the connection that produced it: the wrapper
/// closes the stream, stores the error and re-reports it on each subsequent
/// access. A detection *timeout* is deliberately absent here - a peer that never
/// sends a header is not an error, it degrades to passthrough.
#[derive(Error, Debug)]
pub enum ParseError {
    /// A v1 text header whose line structure is wrong (field count, oversize
    /// line, non-ASCII bytes).
    #[error("malformed header: {reason}")]
    MalformedHeader { reason: String },

    /// A recognized header carrying an unsupported transport, version, command
    /// or address family.
    #[error("unsupported protocol: {reason}")]
    UnsupportedProtocol { reason: String },

    /// An IP or port literal that does not parse.
    #[error("invalid address: {reason}")]
    InvalidAddress { reason: String },

    /// A v2 header whose declared address-block length disagrees with the
    /// length implied by its address family.
    #[error("address block length mismatch: declared {declared}, expected {expected}")]
    LengthMismatch { declared: u16, expected: u16 },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn malformed_header<S: ToString>(reason: S) -> Self {
        Self::MalformedHeader { reason: reason.to_string() }
    }

    pub fn unsupported_protocol<S: ToString>(reason: S) -> Self {
        Self::UnsupportedProtocol { reason: reason.to_string() }
    }

    pub fn invalid_address<S: ToString>(reason: S) -> Self {
        Self::InvalidAddress { reason: reason.to_string() }
    }

    pub fn length_mismatch(declared: u16, expected: u16) -> Self {
        Self::LengthMismatch { declared, expected }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
