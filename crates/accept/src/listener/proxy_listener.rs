use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

use crate::config::ProxyProtocolConfig;
use crate::connection::ProxyConnection;
use crate::listener::Allowlist;
use crate::protocol::BindError;

/// Keep-alive probe time applied to every accepted connection.
const KEEPALIVE_TIME: Duration = Duration::from_secs(3 * 60);

/// A TCP listener that gates PROXY header detection per connection.
///
/// On each accept it applies keep-alive settings and decides - from the
/// protocol-enabled flag and the relayer [`Allowlist`] - whether the new
/// connection is eligible for header detection or is handed back as inert
/// passthrough. Untrusted peers' bytes are never even peeked for a header.
#[derive(Debug)]
pub struct ProxyListener {
    listener: TcpListener,
    enabled: bool,
    allowlist: Allowlist,
    header_timeout: Option<Duration>,
}

impl ProxyListener {
    /// Binds a TCP socket and builds the relayer allowlist once.
    ///
    /// # Errors
    ///
    /// [`BindError::Bind`] on an invalid address or a port already in use,
    /// [`BindError::InvalidAllowlistEntry`] on an unparsable allowlist string.
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: &ProxyProtocolConfig) -> Result<Self, BindError> {
        let allowlist = Allowlist::parse(&config.allowed_relayers)?;
        let listener = TcpListener::bind(addr).await?;

        info!(
            addr = %listener.local_addr()?,
            proxy_protocol = config.enabled,
            open_allowlist = allowlist.is_empty(),
            "listening"
        );

        Ok(Self { listener, enabled: config.enabled, allowlist, header_timeout: config.header_timeout() })
    }

    /// The socket address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next inbound connection.
    ///
    /// Transport errors pass through verbatim; whether the accept loop
    /// continues after one is the caller's decision, not this layer's.
    pub async fn accept(&self) -> io::Result<(ProxyConnection<TcpStream>, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        apply_keepalive(&stream, peer);

        let local = stream.local_addr()?;
        let eligible = self.enabled && self.allowlist.permits(peer.ip());

        let conn = if eligible {
            debug!(%peer, "accepted, eligible for proxy header detection");
            ProxyConnection::new(stream, local, peer, self.header_timeout)
        } else {
            debug!(%peer, enabled = self.enabled, "accepted without proxy header detection");
            ProxyConnection::passthrough(stream, local, peer)
        };

        Ok((conn, peer))
    }
}

/// Applied to every accepted connection, unconditionally. A socket that
/// rejects the option is still usable, so this never fails the accept.
fn apply_keepalive(stream: &TcpStream, peer: SocketAddr) {
    let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_TIME);
    if let Err(e) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
        warn!(%peer, cause = %e, "failed to enable tcp keep-alive");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn bound(config: ProxyProtocolConfig) -> (ProxyListener, SocketAddr) {
        let listener = ProxyListener::bind("127.0.0.1:0", &config).await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    fn enabled_config(allowed: &[&str]) -> ProxyProtocolConfig {
        ProxyProtocolConfig {
            enabled: true,
            allowed_relayers: allowed.iter().map(ToString::to_string).collect(),
            ..ProxyProtocolConfig::default()
        }
    }

    #[tokio::test]
    async fn empty_allowlist_wraps_every_connection_for_detection() {
        let (listener, addr) = bound(enabled_config(&[])).await;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"PROXY TCP4 203.0.113.7 203.0.113.1 51234 443\r\nping").await.unwrap();
            stream
        });

        let (mut conn, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 16];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(conn.peer_addr().await.unwrap(), "203.0.113.7:51234".parse().unwrap());

        drop(client.await.unwrap());
    }

    #[tokio::test]
    async fn loopback_relayer_in_allowlist_is_detected() {
        let (listener, addr) = bound(enabled_config(&["127.0.0.0/8"])).await;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"PROXY TCP6 2001:db8::1 2001:db8::2 51234 443\r\n").await.unwrap();
            stream
        });

        let (mut conn, _) = listener.accept().await.unwrap();
        assert_eq!(conn.peer_addr().await.unwrap(), "[2001:db8::1]:51234".parse().unwrap());
        assert_eq!(conn.local_addr().await.unwrap(), "[2001:db8::2]:443".parse().unwrap());

        drop(client.await.unwrap());
    }

    #[tokio::test]
    async fn peer_outside_allowlist_gets_verbatim_bytes() {
        let (listener, addr) = bound(enabled_config(&["203.0.113.0/24"])).await;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            // a spoofed-looking prefix from an untrusted peer
            stream.write_all(b"PROXY TCP4 203.0.113.7 203.0.113.1 51234 443\r\n").await.unwrap();
            stream.shutdown().await.unwrap();
            stream
        });

        let (mut conn, peer) = listener.accept().await.unwrap();
        let mut collected = Vec::new();
        conn.read_to_end(&mut collected).await.unwrap();
        assert_eq!(&collected[..], b"PROXY TCP4 203.0.113.7 203.0.113.1 51234 443\r\n");
        assert_eq!(conn.peer_addr().await.unwrap(), peer);

        drop(client.await.unwrap());
    }

    #[tokio::test]
    async fn disabled_protocol_skips_detection_entirely() {
        let (listener, addr) = bound(ProxyProtocolConfig::default()).await;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"PROXY TCP4 203.0.113.7 203.0.113.1 51234 443\r\n").await.unwrap();
            stream.shutdown().await.unwrap();
            stream
        });

        let (mut conn, peer) = listener.accept().await.unwrap();
        let mut collected = Vec::new();
        conn.read_to_end(&mut collected).await.unwrap();
        assert!(collected.starts_with(b"PROXY TCP4"));
        assert_eq!(conn.peer_addr().await.unwrap(), peer);

        drop(client.await.unwrap());
    }

    #[tokio::test]
    async fn invalid_allowlist_entry_fails_bind() {
        let err = ProxyListener::bind("127.0.0.1:0", &enabled_config(&["not-a-network"])).await.unwrap_err();
        assert!(matches!(err, BindError::InvalidAllowlistEntry { .. }));
    }

    #[tokio::test]
    async fn occupied_port_fails_bind() {
        let (_first, addr) = bound(ProxyProtocolConfig::default()).await;
        let err = ProxyListener::bind(addr, &ProxyProtocolConfig::default()).await.unwrap_err();
        assert!(matches!(err, BindError::Bind { .. }));
    }
}
