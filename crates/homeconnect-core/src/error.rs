//! Error types for the session state primitives.
//!
//! This crate only owns the pure parts of the session (phase transitions,
//! id allocation, service-version bookkeeping, keepalive timing). Transport
//! and handshake failures belong to `homeconnect-client`'s error type, which
//! wraps this one.

use thiserror::Error;

use crate::session::SessionPhase;

/// Errors raised by the pure session-state primitives in this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// An operation was attempted from a phase that does not allow it.
    #[error("invalid session transition: cannot {operation} from {phase:?}")]
    InvalidTransition {
        /// The phase the session was in.
        phase: SessionPhase,
        /// The operation that was attempted.
        operation: &'static str,
    },
}
