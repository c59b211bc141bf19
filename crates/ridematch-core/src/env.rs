//! Environment abstraction for deterministic testing.
//!
//! Decouples matching logic from system resources (time, randomness). The
//! production server plugs in the real clock and OS entropy; the simulation
//! harness plugs in a virtual clock and a seeded RNG so every run replays
//! identically.

use std::time::Duration;

use ridematch_proto::ConnectionId;

/// Clock and entropy source for the relay.
///
/// `now()` must never go backwards. Production entropy must be
/// cryptographically secure because connection ids are the only credential a
/// client holds over another's driver record.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Point in time. Subtracting two instants gives the elapsed duration.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Fills the provided buffer with random bytes.
    ///
    /// Given the same seed, a simulated environment produces the same bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// 128 random bits, big-endian.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }

    /// Mints a fresh connection id from 128 random bits.
    fn connection_id(&self) -> ConnectionId {
        ConnectionId::from_u128(self.random_u128())
    }
}
