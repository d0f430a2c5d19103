//! Pure message-preparation logic shared by `send_sync` and the handshake.
//!
//! Filling `sid`/`version`/`msg_id` is the one part of `send_sync` that has
//! no I/O in it at all, so it is kept separate and unit-testable without a
//! socket.

use homeconnect_core::{MessageIdAllocator, ServiceVersions};
use homeconnect_proto::Message;

/// Fill in `sid`, `version`, and `msg_id` on an outbound message, in place.
///
/// - `sid` is left untouched if already set; otherwise filled from the
///   session's negotiated `sid`.
/// - `version` is left untouched if already set; otherwise resolved from
///   `versions` (defaulting to 1 for an unknown or not-yet-negotiated
///   service).
/// - `msg_id` is left untouched if already set (callers building a
///   fire-and-forget NOTIFY may have none); otherwise allocated from `ids`.
pub fn prepare(message: &mut Message, sid: Option<i64>, versions: &ServiceVersions, ids: &mut MessageIdAllocator) {
    if message.sid.is_none() {
        message.sid = sid;
    }
    if message.version.is_none() {
        message.version = Some(versions.version_for_resource(&message.resource));
    }
    if message.msg_id.is_none() {
        message.msg_id = Some(ids.allocate());
    }
}

#[cfg(test)]
mod tests {
    use homeconnect_proto::Action;

    use super::*;

    #[test]
    fn fills_all_three_absent_fields() {
        let mut msg = Message::new("/ro/values");
        let versions = ServiceVersions::new();
        let mut ids = MessageIdAllocator::new();
        ids.seed(100);

        prepare(&mut msg, Some(42), &versions, &mut ids);

        assert_eq!(msg.sid, Some(42));
        assert_eq!(msg.version, Some(1));
        assert_eq!(msg.msg_id, Some(100));
    }

    #[test]
    fn leaves_already_set_fields_alone() {
        let mut msg = Message::new("/ci/services").with_action(Action::Get);
        msg.sid = Some(1);
        msg.version = Some(9);
        msg.msg_id = Some(5);

        let versions = ServiceVersions::new();
        let mut ids = MessageIdAllocator::new();

        prepare(&mut msg, Some(999), &versions, &mut ids);

        assert_eq!(msg.sid, Some(1));
        assert_eq!(msg.version, Some(9));
        assert_eq!(msg.msg_id, Some(5));
    }

    #[test]
    fn resolves_version_from_negotiated_service_map() {
        let mut msg = Message::new("/ci/authentication");
        let mut versions = ServiceVersions::new();
        versions.set("ci", 3);
        let mut ids = MessageIdAllocator::new();

        prepare(&mut msg, None, &versions, &mut ids);

        assert_eq!(msg.version, Some(3));
    }

    #[test]
    fn allocation_advances_the_shared_counter() {
        let mut ids = MessageIdAllocator::new();
        let versions = ServiceVersions::new();

        let mut first = Message::new("/a");
        prepare(&mut first, None, &versions, &mut ids);
        let mut second = Message::new("/b");
        prepare(&mut second, None, &versions, &mut ids);

        assert!(first.msg_id.unwrap() < second.msg_id.unwrap());
    }
}
