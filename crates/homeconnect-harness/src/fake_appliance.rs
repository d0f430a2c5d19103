//! A scripted fake appliance: a [`FrameSink`] that plays the other end of
//! the wire protocol, so `homeconnect-client`'s connect/handshake/keepalive
//! logic can be driven end-to-end without a socket or a real device.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use homeconnect_client::{ClientError, Environment, FrameSink, Session};
use homeconnect_proto::{Action, Message};
use serde_json::json;

/// Appliance-side behavior configuration.
#[derive(Debug, Clone)]
pub struct ApplianceScript {
    /// Negotiated `ci` service version. Values below 3 make the handshake
    /// perform the authentication step.
    pub ci_version: i32,
    /// Negotiated `ei` service version. `2` makes the handshake send
    /// `/ei/deviceReady`.
    pub ei_version: i32,
    /// Whether `/iz/info` should be advertised as available.
    pub has_iz: bool,
    /// Whether `/ni/info` should be advertised as available.
    pub has_ni: bool,
    /// The uid `/ro/allMandatoryValues` reports first, seeding the
    /// keepalive target.
    pub mandatory_value_uid: u32,
}

impl Default for ApplianceScript {
    fn default() -> Self {
        Self { ci_version: 3, ei_version: 2, has_iz: true, has_ni: true, mandatory_value_uid: 1 }
    }
}

/// A fake appliance, standing in for a real socket connection.
///
/// Construct with [`FakeAppliance::new`], [`FakeAppliance::attach`] it to
/// the [`Session`] it is wired to, then push `/ei/initialValues` via
/// [`FakeAppliance::spontaneous_connect`] to kick off the handshake, exactly
/// as a real appliance would upon accepting the connection.
pub struct FakeAppliance<E: Environment> {
    env: E,
    session: Mutex<Option<Session<E>>>,
    script: ApplianceScript,
    probes_received: Arc<AtomicUsize>,
}

impl<E: Environment> FakeAppliance<E> {
    /// Build a fake appliance that has not yet been attached to a session.
    #[must_use]
    pub fn new(env: E, script: ApplianceScript) -> Arc<Self> {
        Arc::new(Self { env, session: Mutex::new(None), script, probes_received: Arc::new(AtomicUsize::new(0)) })
    }

    /// Wire this appliance to the session it is the other end of.
    ///
    /// Must be called once, after `Session::new` but before any traffic
    /// flows, since [`FrameSink::send`] needs a handle back to the session
    /// to deliver replies.
    pub fn attach(&self, session: Session<E>) {
        #[allow(clippy::unwrap_used)]
        { *self.session.lock().unwrap() = Some(session); }
    }

    /// How many `/ro/values` keepalive probes this appliance has answered.
    #[must_use]
    pub fn probes_received(&self) -> usize {
        self.probes_received.load(Ordering::SeqCst)
    }

    /// Push the `/ei/initialValues` message that starts the handshake, as a
    /// real appliance does spontaneously once the socket is open.
    pub async fn spontaneous_connect(&self, sid: i64) {
        let session = self.attached_session();
        let message = Message::new("/ei/initialValues").with_action(Action::Notify).with_data(vec![json!({
            "deviceType": "Application",
            "deviceName": "FakeAppliance",
            "deviceID": "FAKE-0001",
            "edMsgID": 1,
        })]);
        let mut message = message;
        message.sid = Some(sid);
        session.on_message(message).await;
    }

    /// Deliver a `/ro/values` NOTIFY (a spontaneous value update) to the
    /// client, as the appliance would after a setting changes on its own.
    pub async fn push_notify(&self, resource: &str, data: Vec<serde_json::Value>) {
        let session = self.attached_session();
        session.on_message(Message::new(resource).with_action(Action::Notify).with_data(data)).await;
    }

    fn attached_session(&self) -> Session<E> {
        #[allow(clippy::unwrap_used)]
        self.session.lock().unwrap().clone().expect("attach() must be called before driving the appliance")
    }

    fn reply_for(&self, request: &Message) -> Option<Message> {
        let mut response = Message::new(&request.resource).with_action(Action::Response);
        response.sid = request.sid;
        response.msg_id = request.msg_id;

        match request.resource.as_str() {
            "/ci/services" => {
                let mut services = vec![
                    json!({"service": "ci", "version": self.script.ci_version}),
                    json!({"service": "ei", "version": self.script.ei_version}),
                    json!({"service": "ro", "version": 1}),
                ];
                if self.script.has_iz {
                    services.push(json!({"service": "iz", "version": 1}));
                }
                if self.script.has_ni {
                    services.push(json!({"service": "ni", "version": 1}));
                }
                response.data = services;
            },
            "/ci/authentication" | "/ci/info" | "/iz/info" | "/ni/info" | "/ro/allDescriptionChanges" => {},
            "/ro/allMandatoryValues" => {
                response.data = vec![json!({"uid": self.script.mandatory_value_uid, "value": 0})];
            },
            "/ro/values" if request.action == Action::Get => {
                self.probes_received.fetch_add(1, Ordering::SeqCst);
                response.data = vec![json!({"uid": self.script.mandatory_value_uid, "value": 0})];
            },
            "/ro/values" | "/ro/selectedProgram" | "/ro/activeProgram" => {},
            _ => return None,
        }
        Some(response)
    }
}

#[async_trait]
impl<E: Environment> FrameSink for FakeAppliance<E> {
    async fn send(&self, message: &Message) -> Result<(), ClientError> {
        if message.action == Action::Notify {
            // Fire-and-forget NOTIFYs (e.g. /ei/deviceReady) draw no reply.
            return Ok(());
        }
        let Some(reply) = self.reply_for(message) else { return Ok(()) };

        let session = self.attached_session();
        let env = self.env.clone();
        tokio::spawn(async move {
            env.sleep(Duration::from_millis(1)).await;
            session.on_message(reply).await;
        });
        Ok(())
    }
}
