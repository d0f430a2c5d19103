//! AES-256-CBC binary-frame transport.
//!
//! The record cipher is shared between the writer and reader halves behind
//! one mutex: `encrypt`/`decrypt` each mutate only their own MAC chain, but
//! both live on the same [`RecordCipher`] value.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use homeconnect_core::Environment;
use homeconnect_crypto::RecordCipher;
use homeconnect_proto::Message;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use crate::{
    config::SessionConfig,
    error::ClientError,
    session::{FrameSink, Session},
};

struct AesSink<E: Environment> {
    env: E,
    outbound: mpsc::Sender<Vec<u8>>,
    cipher: Arc<Mutex<RecordCipher>>,
}

#[async_trait]
impl<E: Environment> FrameSink for AesSink<E> {
    async fn send(&self, message: &Message) -> Result<(), ClientError> {
        let cleartext = message.encode();
        let frame = {
            let mut cipher = self.cipher.lock().await;
            cipher.encrypt(cleartext.as_bytes(), |buf| self.env.random_bytes(buf))
        };
        self.outbound.send(frame).await.map_err(|_| ClientError::Transport("outbound channel closed".to_string()))
    }
}

/// Dial `config.host` over a plain WebSocket and frame every message
/// through the AES record layer.
///
/// # Errors
///
/// [`ClientError::Transport`] if the PSK/IV can't be decoded or the socket
/// can't be opened.
pub async fn connect<E: Environment>(env: E, config: SessionConfig) -> Result<Session<E>, ClientError> {
    let iv = parse_iv(config.iv64.as_deref())?;
    let psk = homeconnect_crypto::decode_no_pad(&config.psk64).map_err(|e| ClientError::Transport(e.to_string()))?;
    let cipher = Arc::new(Mutex::new(RecordCipher::new(&psk, iv)));

    let url = config.endpoint_url();
    let (ws_stream, _response) =
        tokio_tungstenite::connect_async(&url).await.map_err(|e| ClientError::Transport(e.to_string()))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(32);
    let sink: Arc<dyn FrameSink> =
        Arc::new(AesSink { env: env.clone(), outbound: outbound_tx, cipher: Arc::clone(&cipher) });

    let session = Session::new(env, config, sink);
    session.transition_connecting().await?;

    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if ws_tx.send(WsMessage::Binary(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let reader_session = session.clone();
    let reader_cipher = cipher;
    tokio::spawn(async move {
        while let Some(next) = ws_rx.next().await {
            match next {
                Ok(WsMessage::Binary(bytes)) => {
                    let decoded = reader_cipher.lock().await.decrypt(&bytes);
                    match decoded {
                        Ok(text) => match Message::parse(&text) {
                            Ok(message) => reader_session.on_message(message).await,
                            Err(err) => warn!(error = %err, "dropping undecodable envelope"),
                        },
                        Err(err) => warn!(error = %err, "dropping frame that failed record-layer verification"),
                    }
                },
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {},
                Err(err) => {
                    warn!(error = %err, "websocket read error, closing session");
                    break;
                },
            }
        }
        debug!("aes transport reader exiting");
        reader_session.close().await;
    });

    Ok(session)
}

fn parse_iv(iv64: Option<&str>) -> Result<[u8; 16], ClientError> {
    let iv64 = iv64.ok_or_else(|| ClientError::Transport("AES mode requires an iv64".to_string()))?;
    let bytes = homeconnect_crypto::decode_no_pad(iv64).map_err(|e| ClientError::Transport(e.to_string()))?;
    bytes.try_into().map_err(|_| ClientError::Transport("iv must decode to 16 bytes".to_string()))
}
