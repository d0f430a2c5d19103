//! Error types for the AES record layer.

use thiserror::Error;

/// Errors raised while encrypting or decrypting a record-layer frame.
///
/// A decode-side error here is always frame-local: the caller drops the
/// frame and the session continues rather than tearing down the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Frame shorter than 32 bytes or not a multiple of 16.
    #[error("invalid frame length: {len} bytes (must be >= 32 and a multiple of 16)")]
    InvalidFrameLength {
        /// The offending length.
        len: usize,
    },

    /// The received MAC tag did not match the computed tag.
    ///
    /// `last_rx_hmac` is left unchanged when this is returned.
    #[error("MAC verification failed")]
    MacMismatch,

    /// The trailing padding byte was out of the valid 2..=32 range, or
    /// larger than the buffer itself.
    #[error("invalid padding")]
    InvalidPadding,

    /// Decrypted cleartext was not valid UTF-8.
    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8,

    /// Base64 decoding failed.
    #[error("base64 decode failed: {0}")]
    Base64(String),
}
