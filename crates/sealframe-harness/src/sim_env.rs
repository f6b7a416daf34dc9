//! Seeded environment for deterministic simulation.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex, PoisonError};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sealframe_core::Environment;

/// Simulation environment backed by a seeded `ChaCha8` RNG.
///
/// Clones share one RNG stream, so the sequence of keys, nonces and vault
/// ids depends only on the seed and the order of calls.
///
/// # Security
///
/// NOT for production use. Keys drawn from a known seed are predictable.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Create an environment whose RNG is seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }

    /// Derive an independent environment, e.g. one per node.
    ///
    /// The child's seed is drawn from this stream, so derivation itself is
    /// deterministic.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self::with_seed(self.random_u64())
    }
}

impl Environment for SimEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
