//! Production Environment implementation using system time and RNG.
//!
//! Real `std::time::Instant` for connection durations and OS randomness
//! (getrandom) for connection ids. Not reproducible; the harness provides a
//! seeded counterpart for tests.

use ridematch_core::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Connection ids must be unguessable, and RNG
/// failure indicates an OS-level problem the server cannot work around.
#[derive(Clone, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use super::*;

    #[test]
    fn system_env_time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1, "Time should advance");
    }

    #[test]
    fn connection_ids_are_unique() {
        let env = SystemEnv::new();

        let ids: HashSet<_> = (0..1000).map(|_| env.connection_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn connection_ids_are_hex() {
        let env = SystemEnv::new();
        let id = env.connection_id();

        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
