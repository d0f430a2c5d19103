//! AES-256-CBC record layer for the Home Connect LAN protocol.
//!
//! This crate owns exactly one job: turning a cleartext JSON frame into an
//! encrypted, authenticated wire frame and back. It does not know about
//! sessions, handshakes, or transports — those live in `homeconnect-core`
//! and `homeconnect-client`. See [`RecordCipher`] for the entry point.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod b64;
mod error;
mod keys;
mod padding;
mod record;

pub use b64::{decode_no_pad, encode_no_pad};
pub use error::RecordError;
pub use keys::{derive_enc_key, derive_mac_key};
pub use padding::{pad, pad_len, unpad};
pub use record::RecordCipher;

/// Convenience alias for this crate's `Result`.
pub type Result<T> = std::result::Result<T, RecordError>;
