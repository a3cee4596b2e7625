//! Session id generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces nonzero 16-bit session ids, never the same id twice in a row.
#[derive(Debug, Clone)]
pub struct SessionIdGenerator {
    rng: StdRng,
    last: u16,
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdGenerator {
    /// Generator seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            last: 0,
        }
    }

    /// Deterministic generator.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            last: 0,
        }
    }

    /// Next session id.
    pub fn next_id(&mut self) -> u16 {
        loop {
            let id = self.rng.gen_range(1..=u16::MAX);
            if id != self.last {
                self.last = id;
                return id;
            }
        }
    }
}
