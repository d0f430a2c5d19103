//! Error types for the session client.

use homeconnect_core::SessionError;
use homeconnect_proto::ProtocolError;
use thiserror::Error;

/// Why a `send_sync` call, or the connect routine, failed to reach a
/// connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotConnectedReason {
    /// The session has never completed a handshake.
    NeverConnected,
    /// `send_sync` timed out waiting for its pending slot.
    Timeout,
    /// The connect routine did not reach `connected=true` before its
    /// connect-timeout fired.
    ConnectTimeout,
    /// The socket was closed while the call was in flight.
    Closed,
}

impl std::fmt::Display for NotConnectedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NeverConnected => "session has not completed a handshake",
            Self::Timeout => "timed out waiting for a response",
            Self::ConnectTimeout => "connect sequence did not complete in time",
            Self::Closed => "session is closed",
        };
        f.write_str(text)
    }
}

/// Errors raised by the session client.
///
/// Frame-local decode failures (malformed JSON, MAC mismatch) never surface
/// here: the session engine logs and drops the offending frame and keeps
/// running. Everything in this enum propagates to a caller.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Not connected: before handshake, on `send_sync` timeout, or after
    /// the socket closed.
    #[error("not connected: {0}")]
    NotConnected(NotConnectedReason),

    /// A RESPONSE carried a non-absent `code`.
    #[error("appliance returned error code {code} for {resource}")]
    RemoteError {
        /// Error code reported by the appliance.
        code: i32,
        /// Resource the request targeted.
        resource: String,
    },

    /// A mandatory handshake step failed; the connect routine aborted.
    #[error("handshake failed: {0}")]
    HandshakeFailure(String),

    /// The wire envelope could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session engine rejected a state transition (e.g. a duplicate
    /// handshake attempt, or `mark_connected` called out of order).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The underlying socket/TLS layer failed.
    #[error("transport error: {0}")]
    Transport(String),
}
