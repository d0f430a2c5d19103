//! Deterministic simulation harness for `homeconnect-client`/`-entity`.
//!
//! Built on [`turmoil`] for virtual time and a seeded RNG for reproducible
//! randomness: the same seed replays the same nonce and keepalive re-learn
//! sequence run to run, which is what makes flaky-by-timing bugs in the
//! handshake/keepalive logic reproducible rather than occasional.
//!
//! [`SimEnv`] is the [`homeconnect_core::Environment`] implementation;
//! [`FakeAppliance`] stands in for the socket, answering handshake and
//! keepalive traffic the way a real appliance would.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod fake_appliance;
mod sim_env;

pub use fake_appliance::{ApplianceScript, FakeAppliance};
pub use sim_env::SimEnv;
