//! The Home Connect message envelope and its lenient JSON codec.
//!
//! See the wire examples in the crate-level tests: the appliance tolerates a
//! surprising amount of shape drift (numbers as strings, `data` as a bare
//! object instead of an array), and every client on the LAN has to tolerate
//! the same drift or appliances silently stop responding.

use serde_json::Value;

use crate::error::ProtocolError;

/// One of the four actions an envelope can carry.
///
/// Unknown or malformed wire values default to [`Action::Get`] rather than
/// failing the parse — the appliance itself is the only thing that decides
/// what's a valid action, and rejecting an otherwise well-formed message over
/// this field would throw away data we can still route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Read a resource.
    #[default]
    Get,
    /// Write a resource.
    Post,
    /// Reply to a prior `GET`/`POST`.
    Response,
    /// Unsolicited push from the appliance.
    Notify,
}

impl Action {
    fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::String(s)) = value else { return Self::Get };
        match s.to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "RESPONSE" => Self::Response,
            "NOTIFY" => Self::Notify,
            _ => Self::Get,
        }
    }

    /// The upper-case wire representation.
    #[must_use]
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Response => "RESPONSE",
            Self::Notify => "NOTIFY",
        }
    }
}

/// A lenient numeric envelope field.
///
/// Accepts an integer, a float whose fractional part is zero, or a numeric
/// string; anything else (booleans, objects, non-numeric strings) coerces to
/// `None`. `sid`, `msg_id`, `version`, and `code` all share this one coercion
/// path instead of four near-duplicate `match` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumericField(pub Option<i64>);

impl NumericField {
    fn from_value(value: Option<&Value>) -> Self {
        let Some(value) = value else { return Self(None) };
        Self(lenient_i64(value))
    }
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        },
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

/// The Home Connect message envelope (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Slash-prefixed resource path, e.g. `/ro/values`.
    pub resource: String,
    /// One of `GET`/`POST`/`RESPONSE`/`NOTIFY`.
    pub action: Action,
    /// Session identifier, serialised as `sID`.
    pub sid: Option<i64>,
    /// Message identifier, serialised as `msgID`.
    pub msg_id: Option<i64>,
    /// Negotiated service version for the resource's service.
    pub version: Option<i32>,
    /// Ordered payload values. Always a sequence on the logical side, even
    /// when the wire carried a bare object.
    pub data: Vec<Value>,
    /// Error code. Presence on a `RESPONSE` signals failure.
    pub code: Option<i32>,
}

impl Message {
    /// A minimal envelope: `GET` on `resource`, every other field absent.
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: Action::Get,
            sid: None,
            msg_id: None,
            version: None,
            data: Vec::new(),
            code: None,
        }
    }

    /// Builder-style action override.
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Builder-style data override.
    #[must_use]
    pub fn with_data(mut self, data: Vec<Value>) -> Self {
        self.data = data;
        self
    }

    /// Builder-style version override.
    #[must_use]
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }

    /// Parse an envelope from its wire JSON text.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::MalformedJson`] if `text` is not valid JSON.
    /// - [`ProtocolError::NotAnObject`] if the JSON value is not an object.
    /// - [`ProtocolError::MissingResource`] if `resource` is absent or not a
    ///   string.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Parse an envelope from an already-decoded JSON value.
    ///
    /// Exists so the coercion rules in this module are exercisable in tests
    /// without going through a text round trip.
    ///
    /// # Errors
    ///
    /// Same as [`Message::parse`], minus the JSON-syntax case.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let Value::Object(map) = value else { return Err(ProtocolError::NotAnObject) };

        let resource = match map.get("resource") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(ProtocolError::MissingResource),
        };

        let action = Action::from_value(map.get("action"));
        let sid = NumericField::from_value(map.get("sID")).0;
        let msg_id = NumericField::from_value(map.get("msgID")).0;
        #[allow(clippy::cast_possible_truncation)]
        let version = NumericField::from_value(map.get("version")).0.map(|v| v as i32);
        #[allow(clippy::cast_possible_truncation)]
        let code = NumericField::from_value(map.get("code")).0.map(|v| v as i32);

        let data = match map.get("data") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        };

        Ok(Self { resource, action, sid, msg_id, version, data, code })
    }

    /// Serialise to a JSON value, omitting fields the wire protocol omits
    /// when absent/empty (optional numeric fields, empty `data`).
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("resource".to_string(), Value::String(self.resource.clone()));
        map.insert("action".to_string(), Value::String(self.action.as_wire_str().to_string()));

        if let Some(sid) = self.sid {
            map.insert("sID".to_string(), Value::from(sid));
        }
        if let Some(msg_id) = self.msg_id {
            map.insert("msgID".to_string(), Value::from(msg_id));
        }
        if let Some(version) = self.version {
            map.insert("version".to_string(), Value::from(version));
        }
        if !self.data.is_empty() {
            map.insert("data".to_string(), Value::Array(self.data.clone()));
        }
        if let Some(code) = self.code {
            map.insert("code".to_string(), Value::from(code));
        }

        Value::Object(map)
    }

    /// Serialise to wire JSON text.
    #[must_use]
    pub fn encode(&self) -> String {
        // INVARIANT: `to_value` only ever nests strings, numbers parsed from
        // JSON (so always finite), and values cloned from a prior parse.
        // serde_json::to_string can only fail on non-finite floats or map
        // keys that aren't strings, neither of which this builds.
        #[allow(clippy::expect_used)]
        serde_json::to_string(&self.to_value()).expect("invariant: envelope value always encodes")
    }

    /// The two-character service prefix of [`Self::resource`] (e.g. `/ci/…`
    /// → `"ci"`), if the resource has one.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        let rest = self.resource.strip_prefix('/')?;
        rest.get(0..2)
    }
}
