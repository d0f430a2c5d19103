//! TLS 1.2 PSK transport with plain text-frame WebSocket messages.
//!
//! No AES record layer here: confidentiality and integrity both come from
//! the TLS-PSK session, so an inbound text frame is decoded directly as an
//! envelope. `tokio-tungstenite`'s built-in TLS connectors don't expose PSK
//! cipher suites, so the TLS handshake is driven manually with
//! `tokio-openssl` and the resulting stream is handed to `client_async`.

use std::{pin::Pin, sync::Arc};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use homeconnect_core::Environment;
use homeconnect_proto::Message;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_openssl::SslStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use crate::{
    config::SessionConfig,
    error::ClientError,
    session::{FrameSink, Session},
};

struct TlsPskSink {
    outbound: mpsc::Sender<String>,
}

#[async_trait]
impl FrameSink for TlsPskSink {
    async fn send(&self, message: &Message) -> Result<(), ClientError> {
        self.outbound
            .send(message.encode())
            .await
            .map_err(|_| ClientError::Transport("outbound channel closed".to_string()))
    }
}

/// Dial `config.host` over `wss://` with a PSK cipher suite, no certificate
/// verification, and text-frame envelopes.
///
/// # Errors
///
/// [`ClientError::Transport`] if the TLS context, TCP connection, or TLS
/// handshake fails.
pub async fn connect<E: Environment>(env: E, config: SessionConfig) -> Result<Session<E>, ClientError> {
    let tls_stream = dial_tls(&config).await?;

    let url = config.endpoint_url();
    let (ws_stream, _response) =
        tokio_tungstenite::client_async(&url, tls_stream).await.map_err(|e| ClientError::Transport(e.to_string()))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(32);
    let sink: Arc<dyn FrameSink> = Arc::new(TlsPskSink { outbound: outbound_tx });

    let session = Session::new(env, config, sink);
    session.transition_connecting().await?;

    tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let reader_session = session.clone();
    tokio::spawn(async move {
        while let Some(next) = ws_rx.next().await {
            match next {
                Ok(WsMessage::Text(text)) => match Message::parse(&text) {
                    Ok(message) => reader_session.on_message(message).await,
                    Err(err) => warn!(error = %err, "dropping undecodable envelope"),
                },
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {},
                Err(err) => {
                    warn!(error = %err, "websocket read error, closing session");
                    break;
                },
            }
        }
        debug!("tls-psk transport reader exiting");
        reader_session.close().await;
    });

    Ok(session)
}

async fn dial_tls(config: &SessionConfig) -> Result<SslStream<TcpStream>, ClientError> {
    let connector = build_connector(config)?;
    let addr = format!("{}:443", config.host);
    let tcp = TcpStream::connect(&addr).await.map_err(|e| ClientError::Transport(e.to_string()))?;

    let ssl = connector
        .configure()
        .map_err(|e| ClientError::Transport(e.to_string()))?
        .into_ssl(&config.host)
        .map_err(|e| ClientError::Transport(e.to_string()))?;
    let mut stream = SslStream::new(ssl, tcp).map_err(|e| ClientError::Transport(e.to_string()))?;
    Pin::new(&mut stream).connect().await.map_err(|e| ClientError::Transport(e.to_string()))?;
    Ok(stream)
}

/// Build an `SslConnector` pinned to TLS 1.2 with a PSK client callback and
/// no certificate verification, per the appliance's TLS-PSK requirements.
fn build_connector(config: &SessionConfig) -> Result<SslConnector, ClientError> {
    let mut builder = SslConnector::builder(SslMethod::tls()).map_err(|e| ClientError::Transport(e.to_string()))?;

    builder.set_min_proto_version(Some(SslVersion::TLS1_2)).map_err(|e| ClientError::Transport(e.to_string()))?;
    builder.set_max_proto_version(Some(SslVersion::TLS1_2)).map_err(|e| ClientError::Transport(e.to_string()))?;
    builder.set_verify(SslVerifyMode::NONE);

    if let Some(cipher_string) = &config.tls_cipher_string {
        builder.set_cipher_list(cipher_string).map_err(|e| ClientError::Transport(e.to_string()))?;
    }

    let identity = config.psk_identity.clone();
    let psk = homeconnect_crypto::decode_no_pad(&config.psk64).map_err(|e| ClientError::Transport(e.to_string()))?;

    builder.set_psk_client_callback(move |_ssl, _hint, identity_out, psk_out| {
        let identity_bytes = identity.as_bytes();
        let copy_len = identity_bytes.len().min(identity_out.len() - 1);
        identity_out[..copy_len].copy_from_slice(&identity_bytes[..copy_len]);
        identity_out[copy_len] = 0;

        let psk_len = psk.len().min(psk_out.len());
        psk_out[..psk_len].copy_from_slice(&psk[..psk_len]);
        Ok(psk_len)
    });

    Ok(builder.build())
}
