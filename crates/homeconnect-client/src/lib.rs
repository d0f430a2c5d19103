//! Session client for the Home Connect LAN protocol.
//!
//! [`Session`] owns one appliance connection: the handshake, synchronous
//! request/response correlation via [`Session::send_sync`], asynchronous
//! notification dispatch, and the background keepalive loop. It is generic
//! over [`homeconnect_core::Environment`] so the same logic runs against a
//! deterministic simulation clock in tests and real system resources in
//! production.
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::connect`]: dial an appliance over AES or TLS-PSK framing
//!   and return a running [`Session`]
//! - [`transport::websocket`], [`transport::tls_psk`]: the two concrete
//!   [`FrameSink`] implementations

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod error;
mod handshake;
mod keepalive;
mod outbound;
mod pending;
mod session;

#[cfg(feature = "transport")]
pub mod transport;

pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEEPALIVE_IDLE_TIMEOUT, DEFAULT_KEEPALIVE_PROBE_INTERVAL, Mode, SessionConfig,
};
pub use error::{ClientError, NotConnectedReason};
pub use homeconnect_core::{Environment, SystemEnv};
pub use session::{FrameSink, NotifyCallback, Session};
