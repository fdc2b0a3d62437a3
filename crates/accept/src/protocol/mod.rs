//! Core protocol types shared by the codec, connection and listener layers.
//!
//! # Components
//!
//! - **Address carrying** ([`endpoints`]): types produced by header detection
//!   - [`Endpoints`]: the relayed source/destination socket-address pair
//!   - [`Detection`]: detector outcome, either a parsed header or passthrough
//!
//! - **Error Handling** ([`error`]): the error taxonomy of this subsystem
//!   - [`BindError`]: listener construction failures
//!   - [`ParseError`]: terminal header decoding failures
//!
//! All detection errors are terminal for their connection; there is no retry or
//! partial recovery anywhere in this subsystem. See the individual types for the
//! exact variants.

mod endpoints;
pub use endpoints::Detection;
pub use endpoints::Endpoints;

mod error;
pub use error::BindError;
pub use error::ParseError;
