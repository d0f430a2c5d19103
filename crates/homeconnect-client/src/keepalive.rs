//! The background keepalive probe loop.
//!
//! Runs for the lifetime of one connection attempt. A generation counter
//! (bumped by [`Session::close`]) lets a stale loop from a superseded
//! connection notice it has been retired and exit instead of probing a dead
//! socket.

use homeconnect_core::Environment;
use homeconnect_proto::{Action, Message};
use tracing::{debug, warn};

use crate::{error::ClientError, session::Session};

/// Drive the keepalive loop until the session's generation advances past
/// `generation` (meaning [`Session::close`] was called).
pub async fn run<E: Environment>(session: Session<E>, generation: u64) {
    let config = session.config().clone();
    if !config.keepalive_enabled {
        return;
    }

    loop {
        session.env().sleep(config.keepalive_probe_interval).await;

        if session.keepalive_generation().await != generation {
            debug!("keepalive loop retired");
            return;
        }
        if !session.is_connected().await {
            continue;
        }
        let Some(uid) = session.keepalive_uid().await else { continue };
        if !session.keepalive_should_probe(config.keepalive_idle_timeout).await {
            continue;
        }

        session.keepalive_note_probe().await;
        probe(&session, uid, config.keepalive_uid).await;
    }
}

async fn probe<E: Environment>(session: &Session<E>, uid: u32, fallback_uid: Option<u32>) {
    let request = Message::new("/ro/values").with_action(Action::Get).with_data(vec![serde_json::json!({"uid": uid})]);

    match session.send_sync(request, session.config().keepalive_idle_timeout).await {
        Ok(_) => {},
        Err(ClientError::RemoteError { code: 400, .. }) => {
            warn!(uid, "keepalive uid rejected, re-learning");
            relearn_uid(session, fallback_uid).await;
        },
        Err(err) => {
            warn!(error = %err, "keepalive probe failed");
        },
    }
}

async fn relearn_uid<E: Environment>(session: &Session<E>, fallback_uid: Option<u32>) {
    if let Some(fallback) = fallback_uid {
        session.set_keepalive_uid(Some(fallback)).await;
        return;
    }

    let response =
        session.send_sync(Message::new("/ro/allMandatoryValues").with_action(Action::Get), session.config().connect_timeout).await;

    match response {
        Ok(message) => {
            let relearned = message
                .data
                .iter()
                .find_map(|entry| entry.get("uid").and_then(serde_json::Value::as_u64))
                .map(|uid| uid as u32);
            if relearned.is_some() {
                session.set_keepalive_uid(relearned).await;
            } else {
                warn!("no uid found in allMandatoryValues response, disabling keepalive probing");
                session.set_keepalive_uid(None).await;
            }
        },
        Err(err) => {
            warn!(error = %err, "failed to re-learn keepalive uid, disabling probing");
            session.set_keepalive_uid(None).await;
        },
    }
}
