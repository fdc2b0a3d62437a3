//! PROXY protocol header detection and decoding.
//!
//! This module provides a streaming decoder that recognizes an optional HAProxy
//! PROXY protocol preamble - v1 (text) or v2 (binary) - at the very start of a
//! connection, using a state machine over an accumulating byte buffer.
//!
//! # Architecture
//!
//! - [`HeaderDetector`]: the [`Decoder`](tokio_util::codec::Decoder)
//!   implementation dispatching between the two wire formats
//! - [`v1`]: text header parsing (`PROXY TCP4 ...\r\n`)
//! - [`v2`]: binary header parsing (12-byte signature plus fixed fields)
//!
//! # Decoding contract
//!
//! The detector follows the same needs-more-data convention as every other
//! `Decoder`: `Ok(None)` while the buffered bytes are still an ambiguous prefix
//! of one of the two signatures, `Ok(Some(_))` once the outcome is decided,
//! `Err(_)` on a confirmed-but-invalid header. On a
//! [`Detection::Passthrough`](crate::protocol::Detection) outcome nothing is
//! consumed from the buffer - the bytes belong to the application.

mod detector;
mod v1;
mod v2;

pub use detector::HeaderDetector;
