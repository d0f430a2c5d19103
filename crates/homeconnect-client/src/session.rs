//! The session client: connection lifecycle, request/response correlation,
//! and notification dispatch.
//!
//! [`Session`] is cheaply cloneable (it is an `Arc` handle): the socket read
//! loop, the keepalive loop, and any number of concurrent `send_sync`
//! callers each hold a clone. All mutable session-scoped state lives behind
//! one `tokio::sync::Mutex` per field, which is sufficient given the traffic
//! volumes a single appliance produces.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use homeconnect_core::{Environment, KeepaliveClock, MessageIdAllocator, ServiceVersions, SessionState};
use homeconnect_proto::{Action, Message};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    config::SessionConfig,
    error::{ClientError, NotConnectedReason},
    handshake,
    outbound,
    pending::PendingTable,
};

/// Sends one already-prepared envelope over the wire.
///
/// Implementations own the concrete framing: AES record-layer binary
/// frames, or TLS-PSK text frames. Everything in this module only talks to
/// this trait, never to the concrete transport, which is what makes
/// `send_sync`'s logic and the handshake testable with a fake sink.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Encode and send `message`.
    async fn send(&self, message: &Message) -> Result<(), ClientError>;
}

/// Callback invoked for every inbound NOTIFY message.
pub type NotifyCallback = Arc<dyn Fn(Message) + Send + Sync>;

struct Shared<E: Environment> {
    env: E,
    config: SessionConfig,
    state: Mutex<SessionState>,
    sid: Mutex<Option<i64>>,
    ids: Mutex<MessageIdAllocator>,
    versions: Mutex<ServiceVersions>,
    keepalive: Mutex<KeepaliveClock<E::Instant>>,
    keepalive_uid: Mutex<Option<u32>>,
    pending: PendingTable,
    notify: Mutex<Option<NotifyCallback>>,
    handshake_started: AtomicBool,
    handshake_failure: Mutex<Option<String>>,
}

/// A connection (or connection-in-progress) to one appliance.
pub struct Session<E: Environment> {
    shared: Arc<Shared<E>>,
    sink: Arc<dyn FrameSink>,
}

impl<E: Environment> Clone for Session<E> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared), sink: Arc::clone(&self.sink) }
    }
}

impl<E: Environment> Session<E> {
    /// Construct a session over an already-established [`FrameSink`].
    ///
    /// Callers normally reach this via a transport's `connect` function
    /// rather than directly.
    #[must_use]
    pub fn new(env: E, config: SessionConfig, sink: Arc<dyn FrameSink>) -> Self {
        let keepalive_uid = config.keepalive_uid;
        Self {
            shared: Arc::new(Shared {
                env,
                config,
                state: Mutex::new(SessionState::new()),
                sid: Mutex::new(None),
                ids: Mutex::new(MessageIdAllocator::new()),
                versions: Mutex::new(ServiceVersions::new()),
                keepalive: Mutex::new(KeepaliveClock::new()),
                keepalive_uid: Mutex::new(keepalive_uid),
                pending: PendingTable::new(),
                notify: Mutex::new(None),
                handshake_started: AtomicBool::new(false),
                handshake_failure: Mutex::new(None),
            }),
            sink,
        }
    }

    /// The construction config this session was built with.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    #[must_use]
    pub(crate) fn env(&self) -> &E {
        &self.shared.env
    }

    /// `true` once the handshake has completed.
    pub async fn is_connected(&self) -> bool {
        self.shared.state.lock().await.is_connected()
    }

    /// `true` once the session has been closed.
    pub async fn is_closed(&self) -> bool {
        self.shared.state.lock().await.is_closed()
    }

    /// Register the callback invoked for every inbound NOTIFY.
    pub async fn set_notify_callback(&self, callback: NotifyCallback) {
        *self.shared.notify.lock().await = Some(callback);
    }

    pub(crate) async fn adopt_sid(&self, sid: Option<i64>) {
        if sid.is_some() {
            *self.shared.sid.lock().await = sid;
        }
    }

    pub(crate) async fn seed_msg_id(&self, seed: i64) {
        self.shared.ids.lock().await.seed(seed);
    }

    pub(crate) async fn ingest_services(&self, data: &[serde_json::Value]) {
        self.shared.versions.lock().await.ingest_services_response(data);
    }

    pub(crate) async fn service_version(&self, service: &str) -> Option<i32> {
        self.shared.versions.lock().await.get(service)
    }

    pub(crate) async fn keepalive_uid(&self) -> Option<u32> {
        *self.shared.keepalive_uid.lock().await
    }

    pub(crate) async fn set_keepalive_uid(&self, uid: Option<u32>) {
        *self.shared.keepalive_uid.lock().await = uid;
    }

    /// `true` the first time this is called for a session; `false` on every
    /// later call, so a duplicate `/ei/initialValues` never starts a second
    /// handshake task.
    pub(crate) fn mark_handshake_started(&self) -> bool {
        !self.shared.handshake_started.swap(true, Ordering::SeqCst)
    }

    pub(crate) async fn transition_connecting(&self) -> Result<(), ClientError> {
        Ok(self.shared.state.lock().await.start_connecting()?)
    }

    pub(crate) async fn transition_handshaking(&self) -> Result<(), ClientError> {
        Ok(self.shared.state.lock().await.start_handshake()?)
    }

    pub(crate) async fn transition_connected(&self) -> Result<(), ClientError> {
        Ok(self.shared.state.lock().await.mark_connected()?)
    }

    /// Close the session. Idempotent; safe to call from any task.
    ///
    /// Advances the keepalive generation so any in-flight probe loop
    /// observes the change on its next wakeup and exits instead of probing
    /// a dead connection.
    pub async fn close(&self) {
        self.shared.state.lock().await.close();
        self.shared.keepalive.lock().await.advance_generation();
    }

    pub(crate) async fn keepalive_generation(&self) -> u64 {
        self.shared.keepalive.lock().await.generation()
    }

    /// Record the terminal handshake failure that is about to close this
    /// session, so the connect caller can recover it via
    /// [`Session::take_handshake_failure`] instead of seeing a bare timeout.
    pub(crate) async fn record_handshake_failure(&self, context: String) {
        *self.shared.handshake_failure.lock().await = Some(context);
    }

    /// Take the recorded handshake failure, if any. Used by the transport's
    /// connect wait loop to surface [`ClientError::HandshakeFailure`]
    /// instead of a generic not-connected error.
    pub(crate) async fn take_handshake_failure(&self) -> Option<String> {
        self.shared.handshake_failure.lock().await.take()
    }

    pub(crate) async fn keepalive_should_probe(&self, idle_timeout: Duration) -> bool {
        let now = self.shared.env.now();
        self.shared.keepalive.lock().await.should_probe(now, idle_timeout)
    }

    pub(crate) async fn keepalive_note_probe(&self) {
        let now = self.shared.env.now();
        self.shared.keepalive.lock().await.note_probe(now);
    }

    async fn prepare(&self, message: &mut Message) {
        let sid = *self.shared.sid.lock().await;
        let versions = self.shared.versions.lock().await;
        let mut ids = self.shared.ids.lock().await;
        outbound::prepare(message, sid, &versions, &mut ids);
    }

    /// Fill in `sid`/`version`/`msg_id` and send, without waiting for a
    /// response. Used for the handshake's `RESPONSE` reply and its
    /// fire-and-forget `NOTIFY`.
    pub(crate) async fn send_fire_and_forget(&self, mut message: Message) -> Result<(), ClientError> {
        self.prepare(&mut message).await;
        self.sink.send(&message).await
    }

    /// Prepare, send, and wait for the correlated response.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if the send fails, the wait times
    ///   out, or the socket closes while waiting.
    /// - [`ClientError::RemoteError`] if the response carries a `code`.
    pub async fn send_sync(&self, mut message: Message, timeout: Duration) -> Result<Message, ClientError> {
        self.prepare(&mut message).await;
        // INVARIANT: `prepare` always assigns `msg_id` when absent.
        #[allow(clippy::expect_used)]
        let msg_id = message.msg_id.expect("invariant: prepare() always assigns msg_id");

        let rx = self.shared.pending.register(msg_id).await;

        if let Err(err) = self.sink.send(&message).await {
            self.shared.pending.deregister(msg_id).await;
            return Err(err);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => {
                if let Some(code) = response.code {
                    Err(ClientError::RemoteError { code, resource: response.resource.clone() })
                } else {
                    Ok(response)
                }
            },
            Ok(Err(_recv_dropped)) => {
                self.shared.pending.deregister(msg_id).await;
                Err(ClientError::NotConnected(NotConnectedReason::Closed))
            },
            Err(_elapsed) => {
                self.shared.pending.deregister(msg_id).await;
                Err(ClientError::NotConnected(NotConnectedReason::Timeout))
            },
        }
    }

    /// Record inbound activity and dispatch a decoded message.
    ///
    /// Starts the handshake on the first `/ei/initialValues`, hands
    /// `RESPONSE`s to their pending slot, invokes the notify callback for
    /// `NOTIFY`s, and silently drops everything else.
    pub async fn on_message(&self, message: Message) {
        let now = self.shared.env.now();
        self.shared.keepalive.lock().await.note_activity(now);

        if message.resource == "/ei/initialValues" && self.mark_handshake_started() {
            let session = self.clone();
            tokio::spawn(async move {
                if let Err(err) = handshake::run(&session, message).await {
                    warn!(error = %err, "handshake failed, closing session");
                    session.record_handshake_failure(err.to_string()).await;
                    session.close().await;
                }
            });
            return;
        }

        match message.action {
            Action::Response => {
                if let Some(msg_id) = message.msg_id {
                    self.shared.pending.complete(msg_id, message).await;
                }
            },
            Action::Notify => {
                let callback = self.shared.notify.lock().await.clone();
                if let Some(callback) = callback {
                    callback(message);
                }
            },
            Action::Get | Action::Post => {
                debug!(resource = %message.resource, "dropping unsolicited inbound message");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex as StdMutex},
        time::Duration,
    };

    use homeconnect_core::SystemEnv;
    use serde_json::json;

    use super::*;

    struct RecordingSink {
        sent: StdMutex<Vec<Message>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self { sent: StdMutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send(&self, message: &Message) -> Result<(), ClientError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn test_session(sink: Arc<dyn FrameSink>) -> Session<SystemEnv> {
        let config = SessionConfig::new(
            "10.0.0.1",
            "psk",
            crate::config::Mode::Aes,
            "ident",
            "homeconnect-core-test",
            "test-app-id",
        );
        Session::new(SystemEnv::new(), config, sink)
    }

    #[tokio::test]
    async fn send_sync_fills_ids_and_resolves_on_response() {
        let sink = RecordingSink::new();
        let session = test_session(sink.clone());

        let request = Message::new("/ro/values").with_action(Action::Get);
        // A fresh session's allocator starts at 1 and nothing else has been
        // sent yet, so this is the id `send_sync` below will assign.
        let msg_id = 1;

        let session_clone = session.clone();
        let responder = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let mut response =
                Message::new("/ro/values").with_action(Action::Response).with_data(vec![json!({"uid": 1})]);
            response.msg_id = Some(msg_id);
            session_clone.on_message(response).await;
        });

        let result = session.send_sync(request, Duration::from_secs(1)).await.unwrap();
        responder.await.unwrap();

        assert_eq!(result.resource, "/ro/values");
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_sync_surfaces_remote_error_code() {
        let sink = RecordingSink::new();
        let session = test_session(sink);

        let request = Message::new("/ro/values").with_action(Action::Get);
        let msg_id = 1;

        let session_clone = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let mut response = Message::new("/ro/values").with_action(Action::Response);
            response.msg_id = Some(msg_id);
            response.code = Some(400);
            session_clone.on_message(response).await;
        });

        let err = session.send_sync(request, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ClientError::RemoteError { code: 400, .. }));
    }

    #[tokio::test]
    async fn send_sync_times_out_when_nothing_replies() {
        let sink = RecordingSink::new();
        let session = test_session(sink);
        let request = Message::new("/ro/values").with_action(Action::Get);

        let err = session.send_sync(request, Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected(NotConnectedReason::Timeout)));
    }

    #[tokio::test]
    async fn notify_messages_invoke_the_callback() {
        let sink = RecordingSink::new();
        let session = test_session(sink);

        let received = Arc::new(StdMutex::new(None));
        let received_clone = Arc::clone(&received);
        session
            .set_notify_callback(Arc::new(move |msg| {
                *received_clone.lock().unwrap() = Some(msg);
            }))
            .await;

        let notify = Message::new("/ro/values").with_action(Action::Notify);
        session.on_message(notify).await;

        assert_eq!(received.lock().unwrap().as_ref().unwrap().resource, "/ro/values");
    }
}
