//! Deterministic [`Environment`] for turmoil simulations.
//!
//! Time comes from `tokio::time`, which turmoil virtualizes for every host
//! in a simulation: sleeps advance instantly relative to wall-clock time but
//! still order correctly relative to each other. Randomness comes from a
//! seeded `ChaCha8` generator, so a fixed seed reproduces byte-for-byte the
//! same nonce and keepalive re-learn sequence across runs.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use homeconnect_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Simulation environment: virtual time plus a seeded RNG.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Build a simulation environment seeded from a fixed, well-known seed
    /// (`0`). Two simulations built this way produce identical randomness.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Build a simulation environment seeded from `seed`.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        #[allow(clippy::unwrap_used)]
        self.rng.lock().unwrap().fill_bytes(buffer);
    }
}
