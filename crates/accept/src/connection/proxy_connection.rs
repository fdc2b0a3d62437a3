use std::cmp;
use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Sleep, sleep};
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

use crate::codec::HeaderDetector;
use crate::protocol::{Detection, Endpoints, ParseError};

/// Chunk size for draining the wire into the lookahead buffer during
/// detection. A complete header is at most 107 bytes (v1) or 52 bytes (v2),
/// so one read normally suffices.
const DETECT_READ_BYTES: usize = 256;

/// Terminal outcome of the one-shot detection routine.
///
/// `TimedOut` is kept distinct from `Passthrough` for observability, but the
/// two behave identically for the caller: lookahead bytes first, then the
/// inner stream.
#[derive(Debug)]
enum DetectState {
    Pending,
    Passthrough,
    TimedOut,
    Proxied(Endpoints),
    Failed(ParseError),
}

/// A connection that lazily strips an optional PROXY protocol header.
///
/// Wraps an accepted stream and exposes the standard [`AsyncRead`] /
/// [`AsyncWrite`] surface. The first read (or address query) drives the
/// detection state machine; once it settles, reads serve any
/// peeked-but-unconsumed bytes before delegating to the inner stream, and the
/// address accessors report the relayed endpoints when a header was present.
///
/// Detection failures are terminal: the stored error is re-reported on every
/// subsequent access and the connection is unusable.
///
/// # Type Parameters
///
/// * `S`: The wrapped async stream type
#[derive(Debug)]
pub struct ProxyConnection<S> {
    inner: S,
    detector: HeaderDetector,
    lookahead: BytesMut,
    state: DetectState,
    header_timeout: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
    socket_local: SocketAddr,
    socket_peer: SocketAddr,
}

impl<S> ProxyConnection<S> {
    /// Wraps a connection that is eligible for header detection.
    ///
    /// `header_timeout`, when set, bounds how long the first read may wait for
    /// header bytes before degrading to passthrough.
    pub fn new(inner: S, socket_local: SocketAddr, socket_peer: SocketAddr, header_timeout: Option<Duration>) -> Self {
        Self {
            inner,
            detector: HeaderDetector::new(),
            lookahead: BytesMut::new(),
            state: DetectState::Pending,
            header_timeout,
            deadline: None,
            socket_local,
            socket_peer,
        }
    }

    /// Wraps a connection that must never undergo detection (protocol disabled
    /// or peer outside the relayer allowlist). Reads delegate straight to the
    /// inner stream; the peer's bytes are never even peeked.
    pub fn passthrough(inner: S, socket_local: SocketAddr, socket_peer: SocketAddr) -> Self {
        Self {
            inner,
            detector: HeaderDetector::new(),
            lookahead: BytesMut::new(),
            state: DetectState::Passthrough,
            header_timeout: None,
            deadline: None,
            socket_local,
            socket_peer,
        }
    }

    /// The endpoints relayed by a parsed header, if detection has settled on
    /// one. Never triggers detection.
    pub fn proxied_endpoints(&self) -> Option<Endpoints> {
        match &self.state {
            DetectState::Proxied(endpoints) => Some(*endpoints),
            _ => None,
        }
    }

    fn state_error(&self) -> Option<io::Error> {
        match &self.state {
            DetectState::Failed(e) => Some(io::Error::new(io::ErrorKind::InvalidData, e.to_string())),
            _ => None,
        }
    }
}

impl<S> ProxyConnection<S>
where
    S: AsyncRead + Unpin,
{
    /// Drives the one-shot detection routine to completion.
    ///
    /// Idempotent: once the state has left `Pending` this resolves immediately
    /// and never reads the wire again. The deadline, if armed, is dropped on
    /// every exit from `Pending`.
    fn poll_detect(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        loop {
            if !matches!(self.state, DetectState::Pending) {
                self.deadline = None;
                return Poll::Ready(());
            }

            if let Some(timeout) = self.header_timeout {
                let deadline = self.deadline.get_or_insert_with(|| Box::pin(sleep(timeout)));
                if deadline.as_mut().poll(cx).is_ready() {
                    debug!(peer = %self.socket_peer, "header detection timed out, passing through");
                    self.state = DetectState::TimedOut;
                    continue;
                }
            }

            match self.detector.decode(&mut self.lookahead) {
                Ok(Some(Detection::Proxied(endpoints))) => {
                    debug!(
                        peer = %self.socket_peer,
                        source = %endpoints.source,
                        destination = %endpoints.destination,
                        "proxy header parsed"
                    );
                    self.state = DetectState::Proxied(endpoints);
                    continue;
                }
                Ok(Some(Detection::Passthrough)) => {
                    self.state = DetectState::Passthrough;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(peer = %self.socket_peer, cause = %e, "invalid proxy header, dropping connection");
                    self.lookahead.clear();
                    self.state = DetectState::Failed(e);
                    continue;
                }
            }

            // signature still ambiguous or header incomplete, pull more bytes
            let mut chunk = [0u8; DETECT_READ_BYTES];
            let mut read_buf = ReadBuf::new(&mut chunk);
            match Pin::new(&mut self.inner).poll_read(cx, &mut read_buf) {
                Poll::Ready(Ok(())) => {
                    let filled = read_buf.filled();
                    if filled.is_empty() {
                        match self.detector.decode_eof(&mut self.lookahead) {
                            Ok(Some(Detection::Proxied(endpoints))) => {
                                self.state = DetectState::Proxied(endpoints);
                            }
                            Ok(Some(Detection::Passthrough)) | Ok(None) => {
                                self.state = DetectState::Passthrough;
                            }
                            Err(e) => {
                                warn!(peer = %self.socket_peer, cause = %e, "connection closed inside proxy header");
                                self.lookahead.clear();
                                self.state = DetectState::Failed(e);
                            }
                        }
                        continue;
                    }
                    self.lookahead.extend_from_slice(filled);
                }
                Poll::Ready(Err(e)) => {
                    self.lookahead.clear();
                    self.state = DetectState::Failed(ParseError::io(e));
                    continue;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    /// The original client address: the parsed source endpoint when a PROXY
    /// header was present, the socket peer address otherwise.
    ///
    /// Triggers the one-shot detection if it has not run yet, which may wait
    /// up to the configured header timeout.
    pub async fn peer_addr(&mut self) -> io::Result<SocketAddr> {
        poll_fn(|cx| self.poll_detect(cx)).await;
        if let Some(e) = self.state_error() {
            return Err(e);
        }
        Ok(self.proxied_endpoints().map_or(self.socket_peer, |endpoints| endpoints.source))
    }

    /// The address the original client connected to: the parsed destination
    /// endpoint when a PROXY header was present, the socket local address
    /// otherwise.
    ///
    /// Triggers the one-shot detection if it has not run yet.
    pub async fn local_addr(&mut self) -> io::Result<SocketAddr> {
        poll_fn(|cx| self.poll_detect(cx)).await;
        if let Some(e) = self.state_error() {
            return Err(e);
        }
        Ok(self.proxied_endpoints().map_or(self.socket_local, |endpoints| endpoints.destination))
    }
}

impl<S> AsyncRead for ProxyConnection<S>
where
    S: AsyncRead + Unpin,
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_detect(cx));

        if let Some(e) = this.state_error() {
            return Poll::Ready(Err(e));
        }

        // previously peeked bytes come first so nothing is ever lost
        if !this.lookahead.is_empty() {
            let len = cmp::min(this.lookahead.len(), buf.remaining());
            let bytes = this.lookahead.split_to(len);
            buf.put_slice(&bytes);
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S> AsyncWrite for ProxyConnection<S>
where
    S: AsyncWrite + Unpin,
{
    /// Writes never trigger detection; they delegate unconditionally.
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    /// Safe to invoke repeatedly; delegates to the underlying connection.
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
