use std::net::SocketAddr;

/// The original client/server address pair relayed by a PROXY protocol header.
///
/// `source` is the client as the relayer saw it, `destination` the address the
/// client originally connected to. Produced only by a successful parse and
/// immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub source: SocketAddr,
    pub destination: SocketAddr,
}

/// Outcome of running the header detector over the first bytes of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// A complete, valid PROXY header was consumed from the buffer.
    Proxied(Endpoints),

    /// The bytes cannot be a PROXY header; nothing was consumed and the
    /// buffered data belongs to the application.
    Passthrough,
}

impl Detection {
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Detection::Passthrough)
    }

    pub fn endpoints(&self) -> Option<Endpoints> {
        match self {
            Detection::Proxied(endpoints) => Some(*endpoints),
            Detection::Passthrough => None,
        }
    }
}
