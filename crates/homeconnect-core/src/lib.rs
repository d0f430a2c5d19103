//! Sans-IO session primitives for the Home Connect LAN protocol.
//!
//! This crate holds the parts of the session engine that can be
//! unit-tested without a socket: phase transitions, `msg_id` allocation,
//! per-service version bookkeeping, and keepalive timing. The actual
//! connect routine, handshake orchestration, and WebSocket I/O live in
//! `homeconnect-client`, which drives these types via the [`env::Environment`]
//! abstraction so the same logic runs under a virtual clock in tests and
//! real system resources in production.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod session;

pub use env::{Environment, SystemEnv};
pub use error::SessionError;
pub use session::{
    DEFAULT_SERVICE_VERSION, KeepaliveClock, MessageIdAllocator, ServiceVersions, SessionPhase,
    SessionState, service_code,
};

/// Convenience alias for this crate's `Result`.
pub type Result<T> = std::result::Result<T, SessionError>;
