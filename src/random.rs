//! Random generator state for the distribution kernels.
//!
//! Every distribution call draws from a fresh generator seeded with
//! `base + counter`, where the counter advances by one per call. Successive calls
//! therefore produce decorrelated streams, while two `RngState`s built from the
//! same seed replay exactly the same sequence of draws.
//!
//! [`RngState::from_entropy`] mixes the wall clock into the base seed, which is
//! what a training run usually wants. Tests and reproducible experiments use
//! [`RngState::seeded`].

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Caller-owned seed counter threaded through random kernels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RngState {
    base: u64,
    counter: u64,
}

impl RngState {
    /// A reproducible state.
    pub fn seeded(seed: u64) -> Self {
        Self {
            base: seed,
            counter: 0,
        }
    }

    /// A state whose base seed is mixed with the current wall-clock time.
    ///
    /// Not cryptographically secure and not reproducible across runs.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() ^ u64::from(d.subsec_nanos()).rotate_left(32));
        Self::seeded(nanos)
    }

    /// Number of generators handed out so far.
    pub fn draws(&self) -> u64 {
        self.counter
    }

    /// Advances the counter and returns a generator for one kernel call.
    pub fn next_rng(&mut self) -> StdRng {
        self.counter = self.counter.wrapping_add(1);
        StdRng::seed_from_u64(self.base.wrapping_add(self.counter))
    }
}

impl Default for RngState {
    fn default() -> Self {
        Self::from_entropy()
    }
}
