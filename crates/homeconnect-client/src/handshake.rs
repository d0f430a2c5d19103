//! The ordered handshake triggered by an inbound `/ei/initialValues`.
//!
//! Steps 3 onward run concurrently with whatever else the appliance sends,
//! which is why each step goes through [`Session::send_sync`] rather than a
//! private request path: a `RESPONSE` for one of these requests looks
//! exactly like a `RESPONSE` for an application call, and both are
//! correlated through the same pending table.

use std::time::Duration;

use homeconnect_core::Environment;
use homeconnect_proto::{Action, Message};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{error::ClientError, keepalive, session::Session};

const RO_DESCRIPTION_TIMEOUT: Duration = Duration::from_secs(30);
// Not specified by the protocol for these steps; chosen to comfortably
// exceed LAN round-trip time without stalling a failed handshake for long.
const HANDSHAKE_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Drive the nine-step handshake to completion.
///
/// `initial_values` is the `/ei/initialValues` message that triggered this
/// run. On success the session transitions to `Connected`; on any mandatory
/// step's failure the session is left in `Handshaking` and the caller
/// (`Session::on_message`) closes it.
pub async fn run<E: Environment>(session: &Session<E>, initial_values: Message) -> Result<(), ClientError> {
    session.transition_handshaking().await?;

    // Step 1: adopt the appliance-assigned session id and seed msg_id
    // continuity from the embedded edMsgID, if present.
    session.adopt_sid(initial_values.sid).await;
    if let Some(ed_msg_id) = initial_values.data.first().and_then(|v| v.get("edMsgID")).and_then(Value::as_i64) {
        session.seed_msg_id(ed_msg_id).await;
    }

    // Step 2: acknowledge with our own identity, echoing the triggering
    // message's correlation fields verbatim.
    let mut reply = Message::new("/ei/initialValues").with_action(Action::Response).with_data(vec![
        serde_json::json!({
            "deviceType": "Application",
            "deviceName": session.config().app_name,
            "deviceID": session.config().app_id,
        }),
    ]);
    reply.sid = initial_values.sid;
    reply.msg_id = initial_values.msg_id;
    reply.version = initial_values.version;
    session.send_fire_and_forget(reply).await?;

    // Step 3: learn every service's negotiated version.
    let services = session
        .send_sync(Message::new("/ci/services").with_action(Action::Get).with_version(1), HANDSHAKE_STEP_TIMEOUT)
        .await?;
    session.ingest_services(&services.data).await;

    // Step 4: authenticate if the negotiated ci version requires it, then
    // fetch device info best-effort.
    if session.service_version("ci").await.is_some_and(|v| v < 3) {
        let mut nonce_bytes = [0u8; 32];
        session.env().random_bytes(&mut nonce_bytes);
        let nonce = homeconnect_crypto::encode_no_pad(&nonce_bytes);
        let auth = session
            .send_sync(
                Message::new("/ci/authentication")
                    .with_action(Action::Get)
                    .with_data(vec![serde_json::json!({"nonce": nonce})]),
                HANDSHAKE_STEP_TIMEOUT,
            )
            .await;
        best_effort(auth.map(|_| ()), "/ci/authentication");

        let info = session.send_sync(Message::new("/ci/info").with_action(Action::Get), HANDSHAKE_STEP_TIMEOUT).await;
        best_effort(info.map(|_| ()), "/ci/info");
    }

    // Step 5: best-effort info service.
    if session.service_version("iz").await.is_some() {
        let info = session.send_sync(Message::new("/iz/info").with_action(Action::Get), HANDSHAKE_STEP_TIMEOUT).await;
        best_effort(info.map(|_| ()), "/iz/info");
    }

    // Step 6: announce readiness if the negotiated ei version expects it.
    if session.service_version("ei").await == Some(2) {
        session.send_fire_and_forget(Message::new("/ei/deviceReady").with_action(Action::Notify)).await?;
    }

    // Step 7: best-effort network info.
    if session.service_version("ni").await.is_some() {
        let info = session.send_sync(Message::new("/ni/info").with_action(Action::Get), HANDSHAKE_STEP_TIMEOUT).await;
        best_effort(info.map(|_| ()), "/ni/info");
    }

    // Step 8: best-effort description/value snapshot. A successful
    // allMandatoryValues response, if we don't already have a keepalive
    // target, also seeds the keepalive UID.
    let descriptions =
        session.send_sync(Message::new("/ro/allDescriptionChanges").with_action(Action::Get), RO_DESCRIPTION_TIMEOUT).await;
    best_effort(descriptions.map(|_| ()), "/ro/allDescriptionChanges");

    let values =
        session.send_sync(Message::new("/ro/allMandatoryValues").with_action(Action::Get), RO_DESCRIPTION_TIMEOUT).await;
    match values {
        Ok(values) => {
            if session.keepalive_uid().await.is_none() {
                if let Some(uid) = first_uid(&values.data) {
                    session.set_keepalive_uid(Some(uid)).await;
                }
            }
        },
        Err(err) => warn!(error = %err, resource = "/ro/allMandatoryValues", "best-effort handshake step failed"),
    }

    // Step 9: the handshake is complete. Spawn the keepalive loop here,
    // the natural (re)connect point, rather than at transport dial time:
    // that keeps keepalive reachable on the sans-IO path, where a session
    // is driven straight through `on_message` and never sees a transport
    // `connect` function.
    session.transition_connected().await?;
    let generation = session.keepalive_generation().await;
    tokio::spawn(keepalive::run(session.clone(), generation));
    debug!("handshake complete");
    Ok(())
}

fn best_effort(result: Result<(), ClientError>, resource: &'static str) {
    if let Err(err) = result {
        warn!(error = %err, resource, "best-effort handshake step failed");
    }
}

fn first_uid(data: &[Value]) -> Option<u32> {
    #[allow(clippy::cast_possible_truncation)]
    data.iter().find_map(|entry| entry.get("uid").and_then(Value::as_u64)).map(|uid| uid as u32)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn first_uid_finds_first_entry_with_a_uid_field() {
        let data = vec![json!({"value": 1}), json!({"uid": 7, "value": 2}), json!({"uid": 9})];
        assert_eq!(first_uid(&data), Some(7));
    }

    #[test]
    fn first_uid_is_none_when_no_entry_has_one() {
        let data = vec![json!({"value": 1}), json!({"other": 2})];
        assert_eq!(first_uid(&data), None);
    }
}
