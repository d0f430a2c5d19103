//! Error types for entity/program operations and profile-to-runtime wiring.

use thiserror::Error;

/// Errors raised by [`crate::runtime`] operations and
/// [`crate::wiring::build_registry`] dispatch.
#[derive(Error, Debug, Clone)]
pub enum EntityError {
    /// A write was attempted on an entity that is neither `ReadWrite` nor
    /// `WriteOnly`, or whose `available` flag is `false`.
    #[error("entity {uid} is not writable (access={access}, available_false={available_false})")]
    NotWritable {
        /// The entity's uid.
        uid: u32,
        /// The entity's access mode, or `"none"` if absent.
        access: String,
        /// Whether the entity is explicitly marked unavailable.
        available_false: bool,
    },

    /// A high-level operation was called with a missing or malformed
    /// argument (e.g. a program `start()` referencing an option uid that
    /// does not exist in the supplied registry).
    #[error("invalid operation payload: {0}")]
    InvalidServicePayload(String),

    /// Dispatch to an entity uid that the registry does not contain.
    #[error("unknown entity uid {0}")]
    UnknownEntity(u32),

    /// Dispatch to an entity/service name that the registry does not
    /// contain.
    #[error("unknown service {0:?}")]
    UnknownService(String),

    /// The underlying transport failed (timeout, closed session, or a
    /// `RemoteError` from the appliance).
    #[error("transport error: {0}")]
    Transport(String),
}
