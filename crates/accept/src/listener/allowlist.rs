use std::net::IpAddr;

use ipnet::IpNet;

use crate::protocol::BindError;

/// The set of network ranges trusted to prepend a PROXY header.
///
/// Built once at listener construction from plain-IP or CIDR strings and
/// immutable afterwards: membership checks are pure subnet-containment
/// arithmetic, never string parsing. An empty allowlist trusts every peer -
/// there is nothing to filter against.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    networks: Vec<IpNet>,
}

impl Allowlist {
    /// Parses configured entries. A plain IP normalizes to the narrowest
    /// prefix (unspecified address to /0, IPv4 to /32, IPv6 to /128); anything
    /// else must be valid CIDR notation.
    pub fn parse(entries: &[String]) -> Result<Self, BindError> {
        let mut networks = Vec::with_capacity(entries.len());
        for entry in entries {
            let network = if let Ok(ip) = entry.parse::<IpAddr>() {
                let prefix = match ip {
                    _ if ip.is_unspecified() => 0,
                    IpAddr::V4(_) => 32,
                    IpAddr::V6(_) => 128,
                };
                IpNet::new(ip, prefix).map_err(|_| BindError::invalid_allowlist_entry(entry))?
            } else {
                entry.parse::<IpNet>().map_err(|_| BindError::invalid_allowlist_entry(entry))?
            };
            networks.push(network);
        }
        Ok(Self { networks })
    }

    /// Whether a peer at `ip` is trusted to speak the PROXY protocol.
    /// First matching network wins; an empty allowlist permits everyone.
    pub fn permits(&self, ip: IpAddr) -> bool {
        self.networks.is_empty() || self.networks.iter().any(|network| network.contains(&ip))
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
