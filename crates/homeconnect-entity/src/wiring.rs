//! Profile-to-runtime wiring: turn a parsed [`DeviceDescription`] into a
//! [`Registry`] of live [`EntityRuntime`]/[`ProgramRuntime`] handles, and
//! infer the uid the keepalive loop should probe.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::Value;

use crate::{
    description::{AccessMode, DeviceDescription, EntityDescription, ProtocolType},
    error::EntityError,
    runtime::{EntityRuntime, ProgramRuntime, Transport},
};

/// What kind of runtime surface a setting/status entity is wired to.
///
/// Informational only — every entity is still reachable through
/// [`Registry::entity`]; this classification exists for callers (e.g. a
/// Home Assistant bridge) that need to pick a UI widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A setting with `min`/`max`/`step`, or any non-enum numeric feature.
    Numeric,
    /// A setting whose `enum_map` has more than two entries.
    Selector,
    /// A `Boolean` setting, or a two-valued enum with recognizable on/off
    /// labels.
    Switch,
    /// A status with `Boolean` type or a recognizable two-valued on/off enum.
    BinarySensor,
    /// Any other status.
    Sensor,
    /// A command: a single-shot write-true operation.
    Command,
}

/// All live entities and programs wired from one appliance's profile.
pub struct Registry<T: Transport> {
    entities: HashMap<u32, Arc<EntityRuntime<T>>>,
    programs: HashMap<u32, Arc<ProgramRuntime<T>>>,
    kinds: HashMap<u32, EntityKind>,
    active_program: Option<Arc<EntityRuntime<T>>>,
    selected_program: Option<Arc<EntityRuntime<T>>>,
}

impl<T: Transport> Registry<T> {
    /// Look up a wired entity (setting, status, event, command, or option)
    /// by uid.
    #[must_use]
    pub fn entity(&self, uid: u32) -> Option<&Arc<EntityRuntime<T>>> {
        self.entities.get(&uid)
    }

    /// Look up a wired program by uid.
    #[must_use]
    pub fn program(&self, uid: u32) -> Option<&Arc<ProgramRuntime<T>>> {
        self.programs.get(&uid)
    }

    /// All wired entities, including options but not programs.
    #[must_use]
    pub fn entities(&self) -> &HashMap<u32, Arc<EntityRuntime<T>>> {
        &self.entities
    }

    /// All wired programs.
    #[must_use]
    pub fn programs(&self) -> &HashMap<u32, Arc<ProgramRuntime<T>>> {
        &self.programs
    }

    /// The runtime surface [`EntityKind`] a given uid was wired to, if any.
    #[must_use]
    pub fn kind(&self, uid: u32) -> Option<EntityKind> {
        self.kinds.get(&uid).copied()
    }

    /// The singleton entity tracking the currently active (running) program,
    /// if the profile declared one.
    #[must_use]
    pub fn active_program_entity(&self) -> Option<&Arc<EntityRuntime<T>>> {
        self.active_program.as_ref()
    }

    /// The singleton entity tracking the currently selected (not yet
    /// started) program, if the profile declared one.
    #[must_use]
    pub fn selected_program_entity(&self) -> Option<&Arc<EntityRuntime<T>>> {
        self.selected_program.as_ref()
    }

    /// Execute a command: write `true` to a [`EntityKind::Command`]-wired
    /// uid, single-shot.
    ///
    /// # Errors
    ///
    /// [`EntityError::UnknownEntity`] if `uid` is not wired as a command.
    /// Otherwise propagates whatever [`EntityRuntime::write`] returns.
    pub async fn execute_command(&self, uid: u32, timeout: Duration) -> Result<(), EntityError> {
        if self.kind(uid) != Some(EntityKind::Command) {
            return Err(EntityError::UnknownEntity(uid));
        }
        let entity = self.entities.get(&uid).ok_or(EntityError::UnknownEntity(uid))?;
        entity.write(&Value::Bool(true), timeout).await
    }

    /// Start whichever program [`Self::selected_program_entity`] currently
    /// names, filling unoverridden options from their shadow values.
    ///
    /// # Errors
    ///
    /// [`EntityError::InvalidServicePayload`] if the profile declared no
    /// selected-program entity, its current value isn't a known program
    /// uid, or that uid isn't a wired program. Otherwise propagates
    /// whatever [`ProgramRuntime::start`] returns.
    pub async fn start_selected_program(
        &self,
        overrides: &[(u32, Value)],
        override_options: bool,
        timeout: Duration,
    ) -> Result<(), EntityError> {
        let selected = self
            .selected_program_entity()
            .ok_or_else(|| EntityError::InvalidServicePayload("no selected-program entity wired".to_string()))?;

        let uid = selected
            .shadow_value()
            .await
            .and_then(|v| v.as_u64())
            .ok_or_else(|| EntityError::InvalidServicePayload("selected program uid not yet known".to_string()))?;
        #[allow(clippy::cast_possible_truncation)]
        let uid = uid as u32;

        let program = self
            .program(uid)
            .ok_or_else(|| EntityError::InvalidServicePayload(format!("selected program uid {uid} is not wired")))?;

        program.start(overrides, override_options, Some(&self.entities), timeout).await
    }
}

/// Wire every feature in `description` into a [`Registry`], sharing one
/// cloned `transport` handle across all of them.
pub fn build_registry<T: Transport + Clone>(description: &DeviceDescription, transport: T) -> Registry<T> {
    let mut entities = HashMap::new();
    let mut kinds = HashMap::new();

    for setting in &description.setting {
        kinds.insert(setting.uid, classify_setting(setting));
        entities.insert(setting.uid, Arc::new(EntityRuntime::new(setting.clone(), transport.clone())));
    }
    for status in &description.status {
        kinds.insert(status.uid, classify_status(status));
        entities.insert(status.uid, Arc::new(EntityRuntime::new(status.clone(), transport.clone())));
    }
    for event in &description.event {
        entities.insert(event.uid, Arc::new(EntityRuntime::new(event.clone(), transport.clone())));
    }
    for command in &description.command {
        kinds.insert(command.uid, EntityKind::Command);
        entities.insert(command.uid, Arc::new(EntityRuntime::new(command.clone(), transport.clone())));
    }
    for option in &description.option {
        entities.insert(option.uid, Arc::new(EntityRuntime::new(option.clone(), transport.clone())));
    }

    let mut programs = HashMap::new();
    for program in &description.program {
        programs.insert(program.uid, Arc::new(ProgramRuntime::new(program.clone(), transport.clone())));
    }

    let active_program =
        description.active_program.as_ref().map(|d| Arc::new(EntityRuntime::new(d.clone(), transport.clone())));
    let selected_program =
        description.selected_program.as_ref().map(|d| Arc::new(EntityRuntime::new(d.clone(), transport.clone())));

    Registry { entities, programs, kinds, active_program, selected_program }
}

fn classify_setting(setting: &EntityDescription) -> EntityKind {
    if setting.protocol_type == Some(ProtocolType::Boolean) {
        return EntityKind::Switch;
    }
    if let Some(enum_map) = &setting.enum_map {
        if enum_map.len() == 2 && on_off_labels(enum_map).is_some() {
            return EntityKind::Switch;
        }
        if enum_map.len() > 2 {
            return EntityKind::Selector;
        }
    }
    if setting.min.is_some() || setting.max.is_some() || setting.step.is_some() {
        return EntityKind::Numeric;
    }
    EntityKind::Numeric
}

fn classify_status(status: &EntityDescription) -> EntityKind {
    if status.protocol_type == Some(ProtocolType::Boolean) {
        return EntityKind::BinarySensor;
    }
    if let Some(enum_map) = &status.enum_map {
        if enum_map.len() == 2 && on_off_labels(enum_map).is_some() {
            return EntityKind::BinarySensor;
        }
    }
    EntityKind::Sensor
}

const ON_LABELS: [&str; 3] = ["on", "standby", "true"];
const OFF_LABELS: [&str; 3] = ["off", "mainsoff", "false"];

/// Decide which of a two-entry `enum_map`'s keys means "on" and which means
/// "off", by matching labels case-insensitively against a recognized
/// vocabulary. Returns `(on_key, off_key)`, or `None` if neither entry's
/// label is recognizable.
///
/// Ties (both entries match the same side, or neither is on/off-only) are
/// broken by: the higher key wins "on", the lower key wins "off".
fn on_off_labels(enum_map: &HashMap<i64, String>) -> Option<(i64, i64)> {
    let mut keys: Vec<i64> = enum_map.keys().copied().collect();
    keys.sort_unstable();
    let [low, high] = keys.as_slice() else { return None };

    let is_on = |label: &str| ON_LABELS.contains(&label.to_ascii_lowercase().as_str());
    let is_off = |label: &str| OFF_LABELS.contains(&label.to_ascii_lowercase().as_str());

    let low_label = enum_map.get(low)?;
    let high_label = enum_map.get(high)?;

    let low_recognized = is_on(low_label) || is_off(low_label);
    let high_recognized = is_on(high_label) || is_off(high_label);
    if !low_recognized && !high_recognized {
        return None;
    }

    Some((*high, *low))
}

/// Choose the uid the keepalive loop should probe: the first declared
/// setting; failing that, the first readable-and-available status; failing
/// that, the first status regardless of availability; failing that, `None`.
#[must_use]
pub fn infer_keepalive_uid(description: &DeviceDescription) -> Option<u32> {
    if let Some(first) = description.setting.first() {
        return Some(first.uid);
    }
    if let Some(first) = description
        .status
        .iter()
        .find(|s| s.access.is_some_and(AccessMode::is_readable) && !s.available.is_false())
    {
        return Some(first.uid);
    }
    description.status.first().map(|s| s.uid)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{description::Tri, error::EntityError};

    use super::*;

    #[derive(Clone)]
    struct NullTransport;

    impl Transport for NullTransport {
        async fn send_sync(
            &self,
            message: homeconnect_proto::Message,
            _timeout: Duration,
        ) -> Result<homeconnect_proto::Message, EntityError> {
            Ok(message)
        }
    }

    fn setting(uid: u32) -> EntityDescription {
        EntityDescription {
            uid,
            name: "Test.Setting".to_string(),
            protocol_type: Some(ProtocolType::Integer),
            access: Some(AccessMode::ReadWrite),
            available: Tri::True,
            min: None,
            max: None,
            step: None,
            enum_map: None,
            option_uids: Vec::new(),
            execution: crate::description::Execution::None,
        }
    }

    fn status(uid: u32, access: Option<AccessMode>, available: Tri) -> EntityDescription {
        EntityDescription {
            uid,
            name: "Test.Status".to_string(),
            protocol_type: Some(ProtocolType::Integer),
            access,
            available,
            min: None,
            max: None,
            step: None,
            enum_map: None,
            option_uids: Vec::new(),
            execution: crate::description::Execution::None,
        }
    }

    #[test]
    fn infer_keepalive_uid_prefers_first_setting() {
        let description = DeviceDescription {
            setting: vec![setting(10), setting(11)],
            status: vec![status(20, Some(AccessMode::Read), Tri::True)],
            ..Default::default()
        };
        assert_eq!(infer_keepalive_uid(&description), Some(10));
    }

    #[test]
    fn infer_keepalive_uid_falls_back_to_readable_available_status() {
        let description = DeviceDescription {
            setting: Vec::new(),
            status: vec![
                status(20, Some(AccessMode::WriteOnly), Tri::True),
                status(21, Some(AccessMode::Read), Tri::False),
                status(22, Some(AccessMode::Read), Tri::True),
            ],
            ..Default::default()
        };
        assert_eq!(infer_keepalive_uid(&description), Some(22));
    }

    #[test]
    fn infer_keepalive_uid_falls_back_to_first_status_when_none_readable() {
        let description = DeviceDescription {
            setting: Vec::new(),
            status: vec![status(30, Some(AccessMode::WriteOnly), Tri::True)],
            ..Default::default()
        };
        assert_eq!(infer_keepalive_uid(&description), Some(30));
    }

    #[test]
    fn infer_keepalive_uid_is_none_when_empty() {
        let description = DeviceDescription::default();
        assert_eq!(infer_keepalive_uid(&description), None);
    }

    #[test]
    fn on_off_labels_recognizes_case_insensitive_values() {
        let mut map = HashMap::new();
        map.insert(0, "Off".to_string());
        map.insert(1, "On".to_string());
        assert_eq!(on_off_labels(&map), Some((1, 0)));
    }

    #[test]
    fn on_off_labels_ties_break_to_max_key_on() {
        let mut map = HashMap::new();
        map.insert(0, "Standby".to_string());
        map.insert(2, "On".to_string());
        assert_eq!(on_off_labels(&map), Some((2, 0)));
    }

    #[test]
    fn on_off_labels_none_when_unrecognized() {
        let mut map = HashMap::new();
        map.insert(0, "Eco".to_string());
        map.insert(1, "Turbo".to_string());
        assert_eq!(on_off_labels(&map), None);
    }

    #[test]
    fn classify_boolean_setting_is_switch() {
        let mut s = setting(1);
        s.protocol_type = Some(ProtocolType::Boolean);
        assert_eq!(classify_setting(&s), EntityKind::Switch);
    }

    #[test]
    fn classify_multi_value_enum_setting_is_selector() {
        let mut s = setting(1);
        let mut map = HashMap::new();
        map.insert(0, "Eco".to_string());
        map.insert(1, "Normal".to_string());
        map.insert(2, "Turbo".to_string());
        s.enum_map = Some(map);
        assert_eq!(classify_setting(&s), EntityKind::Selector);
    }

    #[test]
    fn build_registry_wires_settings_statuses_and_programs() {
        let description = DeviceDescription {
            setting: vec![setting(10)],
            status: vec![status(20, Some(AccessMode::Read), Tri::True)],
            program: vec![EntityDescription {
                uid: 100,
                name: "Test.Program".to_string(),
                protocol_type: None,
                access: None,
                available: Tri::Unknown,
                min: None,
                max: None,
                step: None,
                enum_map: None,
                option_uids: Vec::new(),
                execution: crate::description::Execution::SelectAndStart,
            }],
            ..Default::default()
        };

        let registry = build_registry(&description, NullTransport);

        assert!(registry.entity(10).is_some());
        assert!(registry.entity(20).is_some());
        assert!(registry.program(100).is_some());
        assert_eq!(registry.kind(10), Some(EntityKind::Numeric));
    }

    fn command(uid: u32) -> EntityDescription {
        EntityDescription {
            uid,
            name: "Test.Command.Pause".to_string(),
            protocol_type: Some(ProtocolType::Boolean),
            access: Some(AccessMode::WriteOnly),
            available: Tri::True,
            min: None,
            max: None,
            step: None,
            enum_map: None,
            option_uids: Vec::new(),
            execution: crate::description::Execution::None,
        }
    }

    #[tokio::test]
    async fn execute_command_writes_true() {
        let description =
            DeviceDescription { command: vec![command(900)], ..Default::default() };
        let registry = build_registry(&description, NullTransport);

        registry.execute_command(900, Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn execute_command_rejects_non_command_uid() {
        let description = DeviceDescription { setting: vec![setting(10)], ..Default::default() };
        let registry = build_registry(&description, NullTransport);

        let err = registry.execute_command(10, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, EntityError::UnknownEntity(10)));
    }

    #[tokio::test]
    async fn start_selected_program_reads_uid_from_selected_program_entity() {
        let description = DeviceDescription {
            program: vec![EntityDescription {
                uid: 100,
                name: "Test.Program".to_string(),
                protocol_type: None,
                access: None,
                available: Tri::Unknown,
                min: None,
                max: None,
                step: None,
                enum_map: None,
                option_uids: Vec::new(),
                execution: crate::description::Execution::SelectAndStart,
            }],
            selected_program: Some(EntityDescription {
                uid: 200,
                name: "BSH.Common.Root.SelectedProgram".to_string(),
                protocol_type: Some(ProtocolType::Integer),
                access: Some(AccessMode::ReadWrite),
                available: Tri::True,
                min: None,
                max: None,
                step: None,
                enum_map: None,
                option_uids: Vec::new(),
                execution: crate::description::Execution::None,
            }),
            ..Default::default()
        };
        let registry = build_registry(&description, NullTransport);

        registry.selected_program_entity().unwrap().apply_update(&serde_json::json!({"value": 100})).await;

        registry.start_selected_program(&[], false, Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn start_selected_program_fails_without_a_selected_program_entity() {
        let description = DeviceDescription::default();
        let registry = build_registry(&description, NullTransport);

        let err = registry.start_selected_program(&[], false, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, EntityError::InvalidServicePayload(_)));
    }
}
