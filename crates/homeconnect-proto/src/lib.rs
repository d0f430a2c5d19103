//! Wire envelope for the Home Connect LAN protocol.
//!
//! This crate is Sans-IO: it only knows how to turn JSON text/values into a
//! [`Message`] and back, following the lenient coercion rules the appliance
//! firmware itself relies on. It has no opinion about sockets, encryption, or
//! sessions — those live in the `homeconnect-crypto` and `homeconnect-core`
//! crates respectively.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod envelope;
mod error;

pub use envelope::{Action, Message, NumericField};
pub use error::ProtocolError;

/// Convenience alias for this crate's `Result`.
pub type Result<T> = std::result::Result<T, ProtocolError>;
