//! The v2 (binary) PROXY header format.
//!
//! Layout after the 12-byte signature:
//!
//! ```text
//! byte 12      version (high nibble, must be 0x2) / command (low nibble, must be 0x1)
//! byte 13      address family (0x1 = INET, 0x2 = INET6) / transport (must be 0x1 = STREAM)
//! bytes 14-15  address block length, big-endian
//! then         src ip, dst ip (4 or 16 bytes each), src port, dst port (2 bytes BE each)
//! ```
//!
//! The declared length must equal the length implied by the family byte exactly:
//! 12 for IPv4/STREAM, 36 for IPv6/STREAM. This subsystem accepts no TLV
//! extension bytes, so any other declared length is a mismatch.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::codec::detector::V2_SIGNATURE;
use crate::ensure;
use crate::protocol::{Detection, Endpoints, ParseError};

/// Signature plus version/command, family/transport and length fields.
const FIXED_BYTES: usize = V2_SIGNATURE.len() + 4;

/// Version 2 in the high nibble, command PROXY in the low nibble.
const VERSION_COMMAND: u8 = 0x21;

/// AF_INET / STREAM: 4-byte addresses, 12-byte block.
const FAMILY_INET_STREAM: u8 = 0x11;

/// AF_INET6 / STREAM: 16-byte addresses, 36-byte block.
const FAMILY_INET6_STREAM: u8 = 0x21;

/// Decodes a v2 header. The caller has already matched the full 12-byte
/// signature, so the peer is committed and every validation failure is
/// terminal.
///
/// Consumes the fixed part and the address block on success, nothing otherwise.
pub(super) fn decode(src: &mut BytesMut) -> Result<Option<Detection>, ParseError> {
    if src.len() < FIXED_BYTES {
        return Ok(None);
    }

    let version_command = src[12];
    ensure!(
        version_command == VERSION_COMMAND,
        ParseError::unsupported_protocol(format!("version/command {version_command:#04x}, expected 0x21"))
    );

    let family_transport = src[13];
    let block_len: usize = match family_transport {
        FAMILY_INET_STREAM => 12,
        FAMILY_INET6_STREAM => 36,
        other => {
            return Err(ParseError::unsupported_protocol(format!("family/transport {other:#04x}")));
        }
    };

    let declared = u16::from_be_bytes([src[14], src[15]]);
    ensure!(usize::from(declared) == block_len, ParseError::length_mismatch(declared, block_len as u16));

    if src.len() < FIXED_BYTES + block_len {
        return Ok(None);
    }

    src.advance(FIXED_BYTES);
    let block = src.split_to(block_len);
    trace!(family = family_transport, block_len, "parsed v2 header");

    let endpoints = match family_transport {
        FAMILY_INET_STREAM => {
            let source_ip = Ipv4Addr::new(block[0], block[1], block[2], block[3]);
            let destination_ip = Ipv4Addr::new(block[4], block[5], block[6], block[7]);
            let source_port = u16::from_be_bytes([block[8], block[9]]);
            let destination_port = u16::from_be_bytes([block[10], block[11]]);
            Endpoints {
                source: SocketAddr::new(IpAddr::V4(source_ip), source_port),
                destination: SocketAddr::new(IpAddr::V4(destination_ip), destination_port),
            }
        }
        _ => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&block[0..16]);
            let source_ip = Ipv6Addr::from(octets);
            octets.copy_from_slice(&block[16..32]);
            let destination_ip = Ipv6Addr::from(octets);
            let source_port = u16::from_be_bytes([block[32], block[33]]);
            let destination_port = u16::from_be_bytes([block[34], block[35]]);
            Endpoints {
                source: SocketAddr::new(IpAddr::V6(source_ip), source_port),
                destination: SocketAddr::new(IpAddr::V6(destination_ip), destination_port),
            }
        }
    };

    Ok(Some(Detection::Proxied(endpoints)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2_header(version_command: u8, family: u8, declared_len: u16, block: &[u8]) -> Vec<u8> {
        let mut bytes = V2_SIGNATURE.to_vec();
        bytes.push(version_command);
        bytes.push(family);
        bytes.extend_from_slice(&declared_len.to_be_bytes());
        bytes.extend_from_slice(block);
        bytes
    }

    fn ipv4_block() -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(&[203, 0, 113, 7]); // src ip
        block.extend_from_slice(&[203, 0, 113, 1]); // dst ip
        block.extend_from_slice(&51234u16.to_be_bytes());
        block.extend_from_slice(&443u16.to_be_bytes());
        block
    }

    #[test]
    fn ipv4_header_decodes_exactly() {
        let mut buf = BytesMut::from(&v2_header(0x21, 0x11, 12, &ipv4_block())[..]);
        buf.extend_from_slice(b"payload");

        let endpoints = decode(&mut buf).unwrap().unwrap().endpoints().unwrap();
        assert_eq!(endpoints.source, "203.0.113.7:51234".parse::<SocketAddr>().unwrap());
        assert_eq!(endpoints.destination, "203.0.113.1:443".parse::<SocketAddr>().unwrap());
        assert_eq!(&buf[..], b"payload");
    }

    #[test]
    fn ipv6_header_decodes_exactly() {
        let mut block = Vec::new();
        block.extend_from_slice(&"2001:db8::1".parse::<Ipv6Addr>().unwrap().octets());
        block.extend_from_slice(&"2001:db8::2".parse::<Ipv6Addr>().unwrap().octets());
        block.extend_from_slice(&51234u16.to_be_bytes());
        block.extend_from_slice(&443u16.to_be_bytes());

        let mut buf = BytesMut::from(&v2_header(0x21, 0x21, 36, &block)[..]);

        let endpoints = decode(&mut buf).unwrap().unwrap().endpoints().unwrap();
        assert_eq!(endpoints.source, "[2001:db8::1]:51234".parse::<SocketAddr>().unwrap());
        assert_eq!(endpoints.destination, "[2001:db8::2]:443".parse::<SocketAddr>().unwrap());
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_fixed_part_needs_more_data() {
        let full = v2_header(0x21, 0x11, 12, &ipv4_block());
        let mut buf = BytesMut::from(&full[..14]);
        assert!(decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 14);
    }

    #[test]
    fn partial_address_block_needs_more_data() {
        let full = v2_header(0x21, 0x11, 12, &ipv4_block());
        let mut buf = BytesMut::from(&full[..full.len() - 3]);
        assert!(decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn wrong_version_command_is_unsupported() {
        let mut buf = BytesMut::from(&v2_header(0x20, 0x11, 12, &ipv4_block())[..]);
        assert!(matches!(decode(&mut buf).unwrap_err(), ParseError::UnsupportedProtocol { .. }));
    }

    #[test]
    fn datagram_transport_is_unsupported() {
        // family INET but transport DGRAM
        let mut buf = BytesMut::from(&v2_header(0x21, 0x12, 12, &ipv4_block())[..]);
        assert!(matches!(decode(&mut buf).unwrap_err(), ParseError::UnsupportedProtocol { .. }));
    }

    #[test]
    fn declared_length_disagreement_is_length_mismatch() {
        let mut buf = BytesMut::from(&v2_header(0x21, 0x11, 36, &ipv4_block())[..]);
        match decode(&mut buf).unwrap_err() {
            ParseError::LengthMismatch { declared, expected } => {
                assert_eq!(declared, 36);
                assert_eq!(expected, 12);
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
    }
}
