//! Signature dispatch between the two PROXY protocol wire formats.
//!
//! The detector matches the buffered bytes incrementally against the v1 text
//! prefix first and the v2 binary signature second. A mismatch against the v1
//! prefix is not a failure - the connection may still carry a v2 header or
//! ordinary application traffic - so detection only resolves to
//! [`Detection::Passthrough`] once *neither* signature can match anymore.

use std::cmp;
use std::io;

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::{v1, v2};
use crate::protocol::{Detection, ParseError};

/// The 6-byte v1 text prefix, `"PROXY "`.
pub(crate) const V1_PREFIX: &[u8] = b"PROXY ";

/// The fixed 12-byte v2 binary signature.
pub(crate) const V2_SIGNATURE: &[u8] = b"\r\n\r\n\x00\r\nQUIT\n";

/// Result of matching buffered bytes against a signature prefix.
enum SigMatch {
    /// Every signature byte is present and equal.
    Full,
    /// All buffered bytes match but the signature is longer; need more data.
    Partial,
    /// Some buffered byte differs; this signature can never match.
    No,
}

fn match_signature(buf: &[u8], signature: &[u8]) -> SigMatch {
    let len = cmp::min(buf.len(), signature.len());
    if buf[..len] != signature[..len] {
        SigMatch::No
    } else if len < signature.len() {
        SigMatch::Partial
    } else {
        SigMatch::Full
    }
}

/// Decoder recognizing an optional PROXY protocol header at stream start.
///
/// Implements [`Decoder`] over the connection's lookahead buffer. On success the
/// header bytes (and nothing else) are consumed; on passthrough the buffer is
/// left untouched.
#[derive(Debug, Default)]
pub struct HeaderDetector;

impl HeaderDetector {
    pub fn new() -> Self {
        Self
    }

    /// True once the buffered bytes fully match one of the two signatures,
    /// i.e. the peer has committed to speaking the PROXY protocol.
    ///
    /// Used to classify a premature end of stream: EOF after a confirmed
    /// signature is a truncated header, EOF while the prefix is still
    /// ambiguous is just short ordinary traffic.
    pub fn committed(buf: &[u8]) -> bool {
        matches!(match_signature(buf, V1_PREFIX), SigMatch::Full)
            || matches!(match_signature(buf, V2_SIGNATURE), SigMatch::Full)
    }
}

impl Decoder for HeaderDetector {
    type Item = Detection;
    type Error = ParseError;

    /// Attempts to resolve the detection outcome from the buffered bytes.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Detection::Proxied(_)))` - a complete valid header was consumed
    /// - `Ok(Some(Detection::Passthrough))` - not a PROXY header; nothing consumed
    /// - `Ok(None)` - still an ambiguous signature prefix; need more data
    /// - `Err(_)` - a confirmed header failed validation
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match match_signature(src, V1_PREFIX) {
            SigMatch::Full => return v1::decode(src),
            SigMatch::Partial => return Ok(None),
            SigMatch::No => {}
        }

        match match_signature(src, V2_SIGNATURE) {
            SigMatch::Full => v2::decode(src),
            SigMatch::Partial => Ok(None),
            SigMatch::No => {
                trace!(buffered = src.len(), "no proxy signature, passing through");
                Ok(Some(Detection::Passthrough))
            }
        }
    }

    /// Resolves detection at end of stream.
    ///
    /// A peer that closed after committing to a signature sent a truncated
    /// header, which is an error; a peer that closed mid-prefix was sending
    /// ordinary data that happened to share a few leading bytes.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(detection) => Ok(Some(detection)),
            None if Self::committed(src) => Err(ParseError::io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside proxy header",
            ))),
            None => Ok(Some(Detection::Passthrough)),
        }
    }
}
