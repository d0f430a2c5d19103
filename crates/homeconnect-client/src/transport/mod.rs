//! WebSocket transports: AES binary framing and TLS-PSK text framing.
//!
//! Only built under the `transport` feature, so the pure session/handshake
//! logic in the parent crate can be unit-tested against a fake
//! [`crate::session::FrameSink`] without pulling in `tokio-tungstenite` or
//! `openssl`.

pub mod tls_psk;
pub mod websocket;

use std::time::Duration;

use homeconnect_core::Environment;

use crate::{config::{Mode, SessionConfig}, error::ClientError, session::Session};

const CONNECTED_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Dial `config.host`, run the handshake, and return a connected session.
///
/// Dispatches on [`Mode`] to pick the framing. Blocks until the handshake
/// reaches `connected=true`, a handshake error closes the session, or
/// `config.connect_timeout` elapses.
///
/// # Errors
///
/// [`ClientError::Transport`] if the socket can't be opened;
/// [`ClientError::HandshakeFailure`] with the failing step's context if a
/// mandatory handshake step fails; [`ClientError::NotConnected`] with
/// [`crate::error::NotConnectedReason::ConnectTimeout`] if the handshake
/// does not finish in time.
pub async fn connect<E: Environment>(env: E, config: SessionConfig) -> Result<Session<E>, ClientError> {
    let connect_timeout = config.connect_timeout;
    let session = match config.mode {
        Mode::Aes => websocket::connect(env, config).await?,
        Mode::TlsPsk => tls_psk::connect(env, config).await?,
    };

    wait_for_connected(&session, connect_timeout).await?;
    Ok(session)
}

async fn wait_for_connected<E: Environment>(session: &Session<E>, timeout: Duration) -> Result<(), ClientError> {
    let mut elapsed = Duration::ZERO;
    loop {
        if session.is_connected().await {
            return Ok(());
        }
        if session.is_closed().await {
            if let Some(context) = session.take_handshake_failure().await {
                return Err(ClientError::HandshakeFailure(context));
            }
            return Err(ClientError::NotConnected(crate::error::NotConnectedReason::Closed));
        }
        if elapsed >= timeout {
            return Err(ClientError::NotConnected(crate::error::NotConnectedReason::ConnectTimeout));
        }
        session.env().sleep(CONNECTED_POLL_INTERVAL).await;
        elapsed += CONNECTED_POLL_INTERVAL;
    }
}
