//! Deterministic environment for simulation.
//!
//! Time only moves when a test calls [`SimEnv::advance`], and randomness comes
//! from a ChaCha stream seeded by the test. Two hubs built from the same seed
//! mint the same connection ids in the same order.

use std::{
    ops::Sub,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ridematch_core::Environment;

/// Point on the virtual clock, measured from simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time elapsed since the simulation started.
    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

/// Simulation environment: virtual clock plus seeded RNG.
///
/// Clones share the clock and the RNG stream.
#[derive(Clone, Debug)]
pub struct SimEnv {
    /// Nanoseconds since simulation start
    clock: Arc<AtomicU64>,
    rng: Arc<Mutex<ChaCha8Rng>>,
    seed: u64,
}

impl SimEnv {
    /// Environment with seed 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment whose randomness is fully determined by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            clock: Arc::new(AtomicU64::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            seed,
        }
    }

    /// Seed this environment was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.clock.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(Duration::from_nanos(self.clock.load(Ordering::SeqCst)))
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        // A panic elsewhere cannot leave the RNG half-updated, so a poisoned
        // lock is still usable.
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
