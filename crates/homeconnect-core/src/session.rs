//! Pure session-state primitives.
//!
//! These types hold no socket and perform no I/O; they are the part of the
//! session engine that can be unit-tested without a transport. The
//! orchestration that drives them (the connect routine, the handshake task,
//! the keepalive loop) lives in `homeconnect-client`.

use std::{
    collections::HashMap,
    ops::Sub,
    time::Duration,
};

use serde_json::Value;

use crate::error::SessionError;

/// Lifecycle phase of a session.
///
/// Transitions are one-way except that `Connected` may re-enter itself
/// (notification dispatch does not change phase). Any phase can jump to
/// `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No connection attempt has been made yet.
    Idle,
    /// The WebSocket is being opened.
    Connecting,
    /// The socket is open and the handshake is running.
    Handshaking,
    /// The handshake completed; `send_sync` and notifications are live.
    Connected,
    /// Terminal. No further transitions are possible.
    Closed,
}

impl SessionPhase {
    fn require(self, expected: Self, operation: &'static str) -> Result<(), SessionError> {
        if self == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition { phase: self, operation })
        }
    }
}

/// Tracks the session's lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    phase: SessionPhase,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// A fresh session, starting in [`SessionPhase::Idle`].
    #[must_use]
    pub fn new() -> Self {
        Self { phase: SessionPhase::Idle }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// `true` once the handshake has completed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.phase == SessionPhase::Connected
    }

    /// `true` once the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// Begin opening the WebSocket.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidTransition`] unless currently `Idle`.
    pub fn start_connecting(&mut self) -> Result<(), SessionError> {
        self.phase.require(SessionPhase::Idle, "start_connecting")?;
        self.phase = SessionPhase::Connecting;
        Ok(())
    }

    /// Socket is open; the handshake can now run.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidTransition`] unless currently `Connecting`.
    pub fn start_handshake(&mut self) -> Result<(), SessionError> {
        self.phase.require(SessionPhase::Connecting, "start_handshake")?;
        self.phase = SessionPhase::Handshaking;
        Ok(())
    }

    /// The handshake has completed successfully.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidTransition`] unless currently `Handshaking`.
    pub fn mark_connected(&mut self) -> Result<(), SessionError> {
        self.phase.require(SessionPhase::Handshaking, "mark_connected")?;
        self.phase = SessionPhase::Connected;
        Ok(())
    }

    /// Close the session. Idempotent; callable from any phase.
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }
}

/// Allocates strictly increasing `msg_id` values for one session.
///
/// Seeded from the appliance's `edMsgID` field at the start of the
/// handshake; every id handed out afterwards is one greater than the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageIdAllocator {
    next: i64,
}

impl Default for MessageIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageIdAllocator {
    /// A fresh allocator. Used only until [`Self::seed`] is called with the
    /// appliance's `edMsgID`, or forever if the appliance never supplies one.
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Seed the next id to be handed out, from the appliance's `edMsgID`.
    pub fn seed(&mut self, next_msg_id: i64) {
        self.next = next_msg_id;
    }

    /// Hand out the next id and advance the counter.
    pub fn allocate(&mut self) -> i64 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    /// The id that would be handed out next, without consuming it.
    #[must_use]
    pub fn peek(&self) -> i64 {
        self.next
    }
}

/// Per-service protocol version, negotiated once via `/ci/services`.
///
/// Resources fall back to version 1 for any service not yet present in the
/// map — in particular, every message sent before `/ci/services` completes.
#[derive(Debug, Clone, Default)]
pub struct ServiceVersions {
    versions: HashMap<String, i32>,
}

/// Default service version assumed before `/ci/services` has answered, or
/// for any service it doesn't mention.
pub const DEFAULT_SERVICE_VERSION: i32 = 1;

impl ServiceVersions {
    /// An empty map; every lookup falls back to [`DEFAULT_SERVICE_VERSION`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a service's negotiated version.
    pub fn set(&mut self, service: impl Into<String>, version: i32) {
        self.versions.insert(service.into(), version);
    }

    /// Look up the negotiated version for a service code (e.g. `"ci"`).
    #[must_use]
    pub fn get(&self, service: &str) -> Option<i32> {
        self.versions.get(service).copied()
    }

    /// Resolve the version to stamp on a message bound for `resource`,
    /// defaulting to [`DEFAULT_SERVICE_VERSION`] if the service is unknown.
    #[must_use]
    pub fn version_for_resource(&self, resource: &str) -> i32 {
        service_code(resource)
            .and_then(|service| self.versions.get(service))
            .copied()
            .unwrap_or(DEFAULT_SERVICE_VERSION)
    }

    /// Ingest a `/ci/services` RESPONSE payload: each element must look like
    /// `{"service": "ci", "version": 3}`. Malformed entries are skipped.
    pub fn ingest_services_response(&mut self, data: &[Value]) {
        for entry in data {
            let Some(service) = entry.get("service").and_then(Value::as_str) else { continue };
            let Some(version) = entry.get("version").and_then(Value::as_i64) else { continue };
            #[allow(clippy::cast_possible_truncation)]
            self.set(service, version as i32);
        }
    }
}

/// The two-character service code following the leading `/` in a resource
/// path (e.g. `/ci/services` → `ci`), or `None` if the resource is too
/// short to contain one.
#[must_use]
pub fn service_code(resource: &str) -> Option<&str> {
    let stripped = resource.strip_prefix('/').unwrap_or(resource);
    stripped.get(0..2)
}

/// Tracks keepalive timing and provides loop-generation-based cancellation.
///
/// A new generation is started on every (re)connect; a background probe
/// loop captures the generation it was started with and checks it against
/// [`KeepaliveClock::generation`] before acting, so a stale loop from a
/// previous connection can never send a probe.
#[derive(Debug, Clone)]
pub struct KeepaliveClock<I> {
    generation: u64,
    last_rx_at: Option<I>,
    last_probe_at: Option<I>,
}

impl<I> Default for KeepaliveClock<I> {
    fn default() -> Self {
        Self { generation: 0, last_rx_at: None, last_probe_at: None }
    }
}

impl<I> KeepaliveClock<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// A fresh clock at generation 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation. Background loops compare their captured
    /// generation against this value before acting.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new generation, invalidating any in-flight probe loop that
    /// captured an earlier one. Call this on every (re)connect.
    pub fn advance_generation(&mut self) -> u64 {
        self.generation += 1;
        self.last_rx_at = None;
        self.last_probe_at = None;
        self.generation
    }

    /// Record inbound activity (any decoded frame, not just keepalive
    /// replies).
    pub fn note_activity(&mut self, now: I) {
        self.last_rx_at = Some(now);
    }

    /// Record that a keepalive probe was just sent.
    pub fn note_probe(&mut self, now: I) {
        self.last_probe_at = Some(now);
    }

    /// Whether a keepalive probe should be sent now.
    ///
    /// True only once both the time since last inbound activity and the
    /// time since the last probe exceed `idle_timeout`. A session that has
    /// never seen activity, or never probed, is treated as overdue.
    #[must_use]
    pub fn should_probe(&self, now: I, idle_timeout: Duration) -> bool {
        let rx_overdue = self.last_rx_at.is_none_or(|last| now - last > idle_timeout);
        let probe_overdue = self.last_probe_at.is_none_or(|last| now - last > idle_timeout);
        rx_overdue && probe_overdue
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn t(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    #[test]
    fn phase_transitions_follow_the_happy_path() {
        let mut s = SessionState::new();
        assert_eq!(s.phase(), SessionPhase::Idle);
        s.start_connecting().unwrap();
        s.start_handshake().unwrap();
        s.mark_connected().unwrap();
        assert!(s.is_connected());
        s.close();
        assert!(s.is_closed());
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let mut s = SessionState::new();
        let err = s.start_handshake().unwrap_err();
        assert_eq!(err, SessionError::InvalidTransition {
            phase: SessionPhase::Idle,
            operation: "start_handshake",
        });
    }

    #[test]
    fn close_is_reachable_from_any_phase() {
        for setup in [
            (|_: &mut SessionState| {}) as fn(&mut SessionState),
            |s| s.start_connecting().unwrap(),
            |s| {
                s.start_connecting().unwrap();
                s.start_handshake().unwrap();
            },
        ] {
            let mut s = SessionState::new();
            setup(&mut s);
            s.close();
            assert!(s.is_closed());
        }
    }

    #[test]
    fn message_ids_are_strictly_increasing() {
        let mut ids = MessageIdAllocator::new();
        let first = ids.allocate();
        let second = ids.allocate();
        let third = ids.allocate();
        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn seeding_resumes_from_the_appliance_supplied_value() {
        let mut ids = MessageIdAllocator::new();
        ids.seed(4_282_959_678);
        assert_eq!(ids.allocate(), 4_282_959_678);
        assert_eq!(ids.allocate(), 4_282_959_679);
    }

    #[test]
    fn service_code_extracts_two_characters() {
        assert_eq!(service_code("/ci/services"), Some("ci"));
        assert_eq!(service_code("/ro/values"), Some("ro"));
        assert_eq!(service_code("/x"), None);
    }

    #[test]
    fn unknown_service_defaults_to_version_one() {
        let versions = ServiceVersions::new();
        assert_eq!(versions.version_for_resource("/ci/services"), DEFAULT_SERVICE_VERSION);
    }

    #[test]
    fn known_service_returns_negotiated_version() {
        let mut versions = ServiceVersions::new();
        versions.set("ci", 3);
        assert_eq!(versions.version_for_resource("/ci/authentication"), 3);
        assert_eq!(versions.version_for_resource("/ro/values"), DEFAULT_SERVICE_VERSION);
    }

    #[test]
    fn ingest_services_response_parses_valid_entries_and_skips_malformed() {
        let mut versions = ServiceVersions::new();
        let data = serde_json::json!([
            {"service": "ci", "version": 3},
            {"service": "ei", "version": 2},
            {"service": "broken"},
            {"version": 9},
        ]);
        versions.ingest_services_response(data.as_array().unwrap());
        assert_eq!(versions.get("ci"), Some(3));
        assert_eq!(versions.get("ei"), Some(2));
        assert_eq!(versions.get("broken"), None);
    }

    #[test]
    fn keepalive_never_probes_before_first_idle_window() {
        let clock = KeepaliveClock::<Duration>::new();
        assert!(clock.should_probe(t(0), Duration::from_secs(60)));
    }

    #[test]
    fn keepalive_respects_both_activity_and_probe_windows() {
        let mut clock = KeepaliveClock::<Duration>::new();
        clock.note_activity(t(0));
        clock.note_probe(t(0));

        assert!(!clock.should_probe(t(30), Duration::from_secs(60)));
        assert!(clock.should_probe(t(61), Duration::from_secs(60)));
    }

    #[test]
    fn advancing_generation_resets_timers_and_invalidates_old_loops() {
        let mut clock = KeepaliveClock::<Duration>::new();
        clock.note_activity(t(0));
        clock.note_probe(t(0));
        let captured = clock.generation();

        let new_gen = clock.advance_generation();
        assert_ne!(captured, new_gen);
        assert!(clock.should_probe(t(0), Duration::from_secs(60)));
    }
}
