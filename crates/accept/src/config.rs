//! PROXY protocol configuration surface.
//!
//! Supplied by the enclosing framework's configuration loader; this subsystem
//! only consumes it.

use std::time::Duration;

use serde::Deserialize;

/// PROXY protocol settings for a listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyProtocolConfig {
    /// Enable PROXY header detection on this listener.
    pub enabled: bool,

    /// Relayer networks trusted to prepend a PROXY header, as plain IPs or
    /// CIDR strings. Empty means every peer is trusted.
    pub allowed_relayers: Vec<String>,

    /// Seconds the first read may wait for header bytes before the connection
    /// degrades to passthrough. Zero waits indefinitely.
    pub header_timeout_secs: u64,
}

impl Default for ProxyProtocolConfig {
    fn default() -> Self {
        Self { enabled: false, allowed_relayers: Vec::new(), header_timeout_secs: 5 }
    }
}

impl ProxyProtocolConfig {
    /// The detection timeout as a [`Duration`], `None` when unbounded.
    pub fn header_timeout(&self) -> Option<Duration> {
        (self.header_timeout_secs > 0).then(|| Duration::from_secs(self.header_timeout_secs))
    }
}
