//! The v1 (text) PROXY header format.
//!
//! One US-ASCII line, terminated by CRLF and sent before any application data:
//!
//! ```text
//! PROXY <TCP4|TCP6> <src-ip> <dst-ip> <src-port> <dst-port>\r\n
//! ```
//!
//! The protocol caps the line at 107 bytes including the CRLF, so a buffer that
//! grows past that without a terminator is malformed rather than incomplete.

use std::net::{IpAddr, SocketAddr};
use std::str;

use bytes::BytesMut;
use tracing::trace;

use crate::ensure;
use crate::protocol::{Detection, Endpoints, ParseError};

/// Maximum v1 line length including the terminating CRLF.
const MAX_LINE_BYTES: usize = 107;

/// Exact number of space-separated fields in a TCP4/TCP6 header line.
const FIELD_COUNT: usize = 6;

/// Decodes a v1 header line. The caller has already matched the `"PROXY "`
/// prefix, so the peer is committed: anything other than a well-formed line is
/// a terminal error.
///
/// Consumes the entire line (CRLF included) on success, nothing otherwise.
pub(super) fn decode(src: &mut BytesMut) -> Result<Option<Detection>, ParseError> {
    let Some(end) = src.windows(2).position(|window| window == b"\r\n") else {
        ensure!(
            src.len() < MAX_LINE_BYTES,
            ParseError::malformed_header(format!("no CRLF within {MAX_LINE_BYTES} bytes"))
        );
        return Ok(None);
    };

    ensure!(
        end + 2 <= MAX_LINE_BYTES,
        ParseError::malformed_header(format!("line exceeds {MAX_LINE_BYTES} bytes"))
    );

    let line = src.split_to(end + 2);
    let line = str::from_utf8(&line[..end]).map_err(|_| ParseError::malformed_header("line is not ASCII text"))?;
    trace!(line, "parsing v1 header line");

    // Single spaces are the only separator; doubled spaces produce empty
    // fields and fail the count check.
    let fields: Vec<&str> = line.split(' ').collect();
    ensure!(
        fields.len() == FIELD_COUNT,
        ParseError::malformed_header(format!("expected {FIELD_COUNT} fields, got {}", fields.len()))
    );

    match fields[1] {
        "TCP4" | "TCP6" => {}
        other => return Err(ParseError::unsupported_protocol(format!("transport {other:?}"))),
    }

    let source = parse_endpoint(fields[2], fields[4])?;
    let destination = parse_endpoint(fields[3], fields[5])?;

    Ok(Some(Detection::Proxied(Endpoints { source, destination })))
}

fn parse_endpoint(ip: &str, port: &str) -> Result<SocketAddr, ParseError> {
    let ip: IpAddr = ip.parse().map_err(|_| ParseError::invalid_address(format!("ip literal {ip:?}")))?;
    let port: u16 = port.parse().map_err(|_| ParseError::invalid_address(format!("port literal {port:?}")))?;
    Ok(SocketAddr::new(ip, port))
}
