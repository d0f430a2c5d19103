//! Error types for the message envelope codec.

use thiserror::Error;

/// Errors raised while parsing or serialising the wire envelope.
///
/// These are strictly wire-shape errors (not valid JSON, resource missing).
/// The lenient coercion rules in the envelope itself never produce an error;
/// they degrade to `None` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The payload was not valid JSON.
    #[error("malformed envelope: {0}")]
    MalformedJson(String),

    /// The envelope was valid JSON but not a JSON object.
    #[error("envelope is not a JSON object")]
    NotAnObject,

    /// The required `resource` field was missing or not a string.
    #[error("envelope missing required `resource` field")]
    MissingResource,
}
