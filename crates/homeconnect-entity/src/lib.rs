//! Appliance entity/program model for the Home Connect LAN protocol.
//!
//! This crate turns a parsed appliance profile ([`description`]) plus a
//! live [`runtime::Transport`] into typed, stateful handles
//! ([`runtime::EntityRuntime`], [`runtime::ProgramRuntime`]) that coerce
//! values to the wire protocol, track both the last-written and last-
//! appliance-confirmed ("shadow") value, and assemble program start
//! payloads. [`wiring::build_registry`] does the bulk wiring from a profile;
//! [`wiring::infer_keepalive_uid`] picks the uid the session keepalive loop
//! should probe once a profile is available.
//!
//! Parsing the profile XML itself is out of scope for this crate: callers
//! supply an already-parsed [`description::DeviceDescription`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client_adapter;
pub mod description;
pub mod error;
pub mod runtime;
pub mod wiring;

pub use description::{AccessMode, DeviceDescription, EntityDescription, Execution, ProtocolType, Tri};
pub use error::EntityError;
pub use runtime::{EntityRuntime, ProgramRuntime, Transport, coerce};
pub use wiring::{EntityKind, Registry, build_registry, infer_keepalive_uid};
