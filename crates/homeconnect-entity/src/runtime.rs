//! Typed operations on one live entity or program.
//!
//! [`EntityRuntime`] and [`ProgramRuntime`] are generic over [`Transport`]
//! rather than depending on `homeconnect-client` directly: the only
//! dependency this crate has on the outside world is "send a message,
//! get one back," so unit tests substitute a fake implementation instead of
//! a real session.

use std::{collections::HashMap, sync::Arc, time::Duration};

use homeconnect_proto::{Action, Message};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    description::{AccessMode, EntityDescription, ProtocolType, Tri},
    error::EntityError,
};

/// The one capability the entity runtime needs from a session.
///
/// Defined here (not in `homeconnect-core`/`homeconnect-client`) so this
/// crate is independently testable with a fake recording/replaying
/// implementation.
pub trait Transport: Send + Sync {
    /// Send `message` and wait for its correlated response, or time out.
    fn send_sync(
        &self,
        message: Message,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<Message, EntityError>> + Send;
}

struct MutableState {
    value_raw: Option<Value>,
    value_shadow_raw: Option<Value>,
    access: Option<AccessMode>,
    available: Tri,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
}

/// A live, addressable appliance feature: immutable description plus
/// mutable runtime state (current value, shadow value, and the
/// description-change-mutable fields).
pub struct EntityRuntime<T: Transport> {
    description: EntityDescription,
    transport: T,
    state: Mutex<MutableState>,
}

impl<T: Transport> EntityRuntime<T> {
    /// Build a runtime entity from its immutable description, with every
    /// mutable field seeded from the description and no value yet known.
    #[must_use]
    pub fn new(description: EntityDescription, transport: T) -> Self {
        let state = MutableState {
            value_raw: None,
            value_shadow_raw: None,
            access: description.access,
            available: description.available,
            min: description.min,
            max: description.max,
            step: description.step,
        };
        Self { description, transport, state: Mutex::new(state) }
    }

    /// The entity's stable numeric identifier.
    #[must_use]
    pub fn uid(&self) -> u32 {
        self.description.uid
    }

    /// The entity's canonical dotted name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.description.name
    }

    /// The entity's immutable description.
    #[must_use]
    pub fn description(&self) -> &EntityDescription {
        &self.description
    }

    /// Current access mode, as last reported (by the profile or a
    /// description-change notification).
    pub async fn access(&self) -> Option<AccessMode> {
        self.state.lock().await.access
    }

    /// Current availability, as last reported.
    pub async fn available(&self) -> Tri {
        self.state.lock().await.available
    }

    /// The value last acknowledged by the appliance (distinct from
    /// `value_raw`, which also reflects writes not yet confirmed).
    pub async fn shadow_value(&self) -> Option<Value> {
        self.state.lock().await.value_shadow_raw.clone()
    }

    /// Read the current value, mapped through `enum_map` (integer code →
    /// label) when the entity has one and the raw value is an integer code
    /// present in the map; otherwise the raw value itself.
    pub async fn read(&self) -> Option<Value> {
        let raw = self.state.lock().await.value_raw.clone()?;
        Some(self.label_or_raw(&raw))
    }

    fn label_or_raw(&self, raw: &Value) -> Value {
        let Some(map) = &self.description.enum_map else { return raw.clone() };
        let Some(code) = raw.as_i64() else { return raw.clone() };
        map.get(&code).map_or_else(|| raw.clone(), |label| Value::String(label.clone()))
    }

    /// Coerce `value` to the entity's protocol type and write it.
    ///
    /// # Errors
    ///
    /// [`EntityError::NotWritable`] if the entity is not currently
    /// writable. Otherwise propagates whatever the transport returns.
    pub async fn write(&self, value: &Value, timeout: Duration) -> Result<(), EntityError> {
        let (access, available) = {
            let state = self.state.lock().await;
            (state.access, state.available)
        };
        if !access.is_some_and(AccessMode::is_writable) || available.is_false() {
            return Err(EntityError::NotWritable {
                uid: self.description.uid,
                access: access.map_or_else(|| "none".to_string(), |a| a.as_str().to_string()),
                available_false: available.is_false(),
            });
        }

        let coerced = coerce(self.description.protocol_type, value);
        let message = Message::new("/ro/values")
            .with_action(Action::Post)
            .with_data(vec![serde_json::json!({"uid": self.description.uid, "value": coerced})]);

        let response = self.transport.send_sync(message, timeout).await?;
        if response.code.is_none() {
            let mut state = self.state.lock().await;
            state.value_raw = Some(coerced.clone());
            state.value_shadow_raw = Some(coerced);
        }
        Ok(())
    }

    /// Apply an incoming update (a `/ro/values` NOTIFY entry or a
    /// `/ro/descriptionChange` entry) for this entity's uid.
    ///
    /// `value`, if present, is coerced and stored as both the raw and
    /// shadow value — an incoming update is, by definition, appliance-
    /// confirmed. `access`/`available`/`min`/`max`/`stepSize` are absorbed
    /// when present, left untouched otherwise.
    pub async fn apply_update(&self, entry: &Value) {
        let mut state = self.state.lock().await;

        if let Some(value) = entry.get("value") {
            let coerced = coerce(self.description.protocol_type, value);
            state.value_raw = Some(coerced.clone());
            state.value_shadow_raw = Some(coerced);
        }
        if let Some(access) = entry.get("access").and_then(Value::as_str).and_then(AccessMode::parse) {
            state.access = Some(access);
        }
        if let Some(available) = entry.get("available").and_then(Value::as_bool) {
            state.available = if available { Tri::True } else { Tri::False };
        }
        if let Some(min) = entry.get("min").and_then(Value::as_f64) {
            state.min = Some(min);
        }
        if let Some(max) = entry.get("max").and_then(Value::as_f64) {
            state.max = Some(max);
        }
        if let Some(step) = entry.get("stepSize").and_then(Value::as_f64) {
            state.step = Some(step);
        }
    }
}

/// A live, addressable program: `select()` and `start()`.
pub struct ProgramRuntime<T: Transport> {
    description: EntityDescription,
    transport: T,
}

impl<T: Transport> ProgramRuntime<T> {
    /// Build a runtime program from its immutable description.
    #[must_use]
    pub fn new(description: EntityDescription, transport: T) -> Self {
        Self { description, transport }
    }

    /// The program's stable numeric identifier.
    #[must_use]
    pub fn uid(&self) -> u32 {
        self.description.uid
    }

    /// The program's declared option uids, in profile order.
    #[must_use]
    pub fn option_uids(&self) -> &[u32] {
        &self.description.option_uids
    }

    /// `POST /ro/selectedProgram` with an empty options list.
    pub async fn select(&self, timeout: Duration) -> Result<(), EntityError> {
        let message = Message::new("/ro/selectedProgram")
            .with_action(Action::Post)
            .with_data(vec![serde_json::json!({"program": self.description.uid, "options": Vec::<Value>::new()})]);
        self.transport.send_sync(message, timeout).await?;
        Ok(())
    }

    /// `POST /ro/activeProgram`, assembling the options list from explicit
    /// overrides plus (unless `override_options`) a shadow-value fill for
    /// every declared option not already overridden.
    ///
    /// `overrides` is an ordered slice, not a map: the emitted options list
    /// places overrides first in the order given, then shadow-filled
    /// entries in `option_uids` order, matching the caller-controlled
    /// ordering rule.
    pub async fn start<E>(
        &self,
        overrides: &[(u32, Value)],
        override_options: bool,
        entities_by_uid: Option<&HashMap<u32, Arc<EntityRuntime<E>>>>,
        timeout: Duration,
    ) -> Result<(), EntityError>
    where
        E: Transport,
    {
        let mut options: Vec<Value> = overrides.iter().map(|(uid, value)| serde_json::json!({"uid": uid, "value": value})).collect();

        if !override_options {
            if let Some(entities) = entities_by_uid {
                for &option_uid in &self.description.option_uids {
                    if overrides.iter().any(|(uid, _)| *uid == option_uid) {
                        continue;
                    }
                    let Some(entity) = entities.get(&option_uid) else { continue };
                    if entity.access().await != Some(AccessMode::ReadWrite) {
                        continue;
                    }
                    if let Some(shadow) = entity.shadow_value().await {
                        if !shadow.is_null() {
                            options.push(serde_json::json!({"uid": option_uid, "value": shadow}));
                        }
                    }
                }
            }
        }

        let message = Message::new("/ro/activeProgram")
            .with_action(Action::Post)
            .with_data(vec![serde_json::json!({"program": self.description.uid, "options": options})]);
        self.transport.send_sync(message, timeout).await?;
        Ok(())
    }
}

/// Coerce `value` to `protocol_type`'s wire representation.
///
/// An absent `protocol_type` passes `value` through unchanged.
#[must_use]
pub fn coerce(protocol_type: Option<ProtocolType>, value: &Value) -> Value {
    let Some(protocol_type) = protocol_type else { return value.clone() };
    match protocol_type {
        ProtocolType::Boolean => Value::Bool(coerce_bool(value)),
        ProtocolType::Integer => Value::from(coerce_integer(value)),
        ProtocolType::Float => serde_json::Number::from_f64(coerce_float(value)).map_or(Value::Null, Value::Number),
        ProtocolType::String => Value::String(coerce_string(value)),
        ProtocolType::Object => coerce_object(value),
    }
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let lower = s.to_ascii_lowercase();
            if lower == "true" {
                true
            } else if lower == "false" {
                false
            } else {
                s.parse::<f64>().map(|f| f != 0.0).unwrap_or(true)
            }
        },
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn coerce_integer(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Value::String(s) => s.parse::<i64>().unwrap_or_else(|_| s.parse::<f64>().map(|f| f as i64).unwrap_or(0)),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

fn coerce_float(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        },
        _ => 0.0,
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn coerce_object(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}
