//! Immutable appliance profile types: the output shape of the (out-of-scope)
//! XML profile parser.
//!
//! Everything in this module is a plain data description. The entity runtime
//! (`crate::runtime`) owns the mutable, live-connection state built on top of
//! it.

use std::collections::HashMap;

/// The wire type a feature's value is coerced to/from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolType {
    /// Travels the wire as `true`/`false`.
    Boolean,
    /// Travels the wire as a whole number.
    Integer,
    /// Travels the wire as a floating-point number.
    Float,
    /// Travels the wire as a string.
    String,
    /// Travels the wire as a JSON object (or a string encoding one).
    Object,
}

impl ProtocolType {
    /// The XML attribute spelling this variant was parsed from.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::String => "String",
            Self::Object => "Object",
        }
    }
}

/// Who may read/write a feature, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Neither readable nor writable.
    None,
    /// Readable only.
    Read,
    /// Readable and writable.
    ReadWrite,
    /// Writable only.
    WriteOnly,
    /// Readable, but the value never changes at runtime.
    ReadStatic,
}

impl AccessMode {
    /// The XML attribute spelling this variant was parsed from.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Read => "Read",
            Self::ReadWrite => "ReadWrite",
            Self::WriteOnly => "WriteOnly",
            Self::ReadStatic => "ReadStatic",
        }
    }

    /// Parse the wire/profile spelling of an access mode, case-insensitively.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "read" => Some(Self::Read),
            "readwrite" => Some(Self::ReadWrite),
            "writeonly" => Some(Self::WriteOnly),
            "readstatic" => Some(Self::ReadStatic),
            _ => None,
        }
    }

    /// `true` for [`Self::Read`], [`Self::ReadWrite`], and [`Self::ReadStatic`].
    #[must_use]
    pub fn is_readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite | Self::ReadStatic)
    }

    /// `true` for [`Self::ReadWrite`] and [`Self::WriteOnly`].
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite | Self::WriteOnly)
    }
}

/// A tri-valued flag: the profile/wire can say "true", "false", or say
/// nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tri {
    /// Known true.
    True,
    /// Known false.
    False,
    /// Not reported.
    #[default]
    Unknown,
}

impl Tri {
    /// `true` only for [`Self::False`] — the one value that blocks a write.
    #[must_use]
    pub fn is_false(self) -> bool {
        matches!(self, Self::False)
    }
}

/// What a program entity supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Neither `select()` nor `start()` is valid.
    None,
    /// Only `select()`.
    SelectOnly,
    /// Only `start()`.
    StartOnly,
    /// Both `select()` and `start()`.
    SelectAndStart,
}

/// One feature of the appliance, as described by the profile XML.
///
/// Immutable: description-change notifications update the live
/// [`crate::runtime::EntityRuntime`] built from one of these, never this
/// value itself.
#[derive(Debug, Clone)]
pub struct EntityDescription {
    /// Stable numeric identifier, parsed from a hexadecimal attribute.
    pub uid: u32,
    /// Canonical dotted feature name (e.g. `BSH.Common.Setting.PowerState`).
    pub name: String,
    /// Wire type, if the profile specifies one.
    pub protocol_type: Option<ProtocolType>,
    /// Read/write mode, if the profile specifies one.
    pub access: Option<AccessMode>,
    /// Whether the feature is currently usable.
    pub available: Tri,
    /// Inclusive lower bound, for numeric types.
    pub min: Option<f64>,
    /// Inclusive upper bound, for numeric types.
    pub max: Option<f64>,
    /// Step size between valid values, for numeric types.
    pub step: Option<f64>,
    /// Integer code → display label, for enumerated types.
    pub enum_map: Option<HashMap<i64, String>>,
    /// Ordered option uids (programs only).
    pub option_uids: Vec<u32>,
    /// Program execution mode (programs only; [`Execution::None`] otherwise).
    pub execution: Execution,
}

/// The full set of features one appliance exposes, grouped by category.
#[derive(Debug, Clone, Default)]
pub struct DeviceDescription {
    /// Read-only telemetry features.
    pub status: Vec<EntityDescription>,
    /// User-configurable features.
    pub setting: Vec<EntityDescription>,
    /// One-shot push notifications with no persistent value.
    pub event: Vec<EntityDescription>,
    /// Single-shot write-true operations.
    pub command: Vec<EntityDescription>,
    /// Program option features, referenced by `program.option_uids`.
    pub option: Vec<EntityDescription>,
    /// Selectable/startable programs.
    pub program: Vec<EntityDescription>,
    /// Singleton describing the currently running program, if any.
    pub active_program: Option<EntityDescription>,
    /// Singleton describing the currently selected (not yet started) program,
    /// if any.
    pub selected_program: Option<EntityDescription>,
    /// Brand/type/model/version/revision, as reported by the profile.
    pub info: HashMap<String, String>,
}
