//! Transfer parameter negotiation.
//!
//! Each side states a preference for mtu, dt_min and dt_max, where 0 means
//! "no preference". The receiver decides:
//!
//! | Parameter | Both set        | One set     | Neither set |
//! |-----------|-----------------|-------------|-------------|
//! | mtu       | smaller         | that value  | 250         |
//! | dt_min    | larger          | that value  | 7           |
//! | dt_max    | smaller         | that value  | 10          |
//!
//! The result is then made usable: mtu is capped to what fits one frame and
//! dt_max is raised to at least dt_min.

use crate::core::constants::{DEFAULT_DT_MAX, DEFAULT_DT_MIN, DEFAULT_MTU, MAX_MTU};

/// Chunk size and pacing bounds of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferParams {
    /// Chunk size in bytes.
    pub mtu: u16,
    /// Lower pacing bound in ticks.
    pub dt_min: u32,
    /// Upper pacing bound in ticks.
    pub dt_max: u32,
}

/// Pick between two preferences. 0 means no preference.
fn pick<T: Copy + PartialEq + Default>(local: T, remote: T, prefer: fn(T, T) -> T) -> T {
    let zero = T::default();
    if remote == zero {
        local
    } else if local == zero {
        remote
    } else {
        prefer(local, remote)
    }
}

impl TransferParams {
    /// Create from explicit values.
    pub fn new(mtu: u16, dt_min: u32, dt_max: u32) -> Self {
        Self { mtu, dt_min, dt_max }
    }

    /// Negotiate this side's preferences against the peer's.
    pub fn negotiate(&self, remote: &TransferParams) -> TransferParams {
        TransferParams {
            mtu: pick(self.mtu, remote.mtu, std::cmp::min),
            dt_min: pick(self.dt_min, remote.dt_min, std::cmp::max),
            dt_max: pick(self.dt_max, remote.dt_max, std::cmp::min),
        }
        .sanitized()
    }

    /// Replace unset values by defaults and make the set usable.
    pub fn sanitized(self) -> TransferParams {
        let mtu = if self.mtu == 0 { DEFAULT_MTU } else { self.mtu.min(MAX_MTU) };
        let dt_min = if self.dt_min == 0 { DEFAULT_DT_MIN } else { self.dt_min };
        let dt_max = if self.dt_max == 0 { DEFAULT_DT_MAX } else { self.dt_max };
        TransferParams {
            mtu,
            dt_min,
            dt_max: dt_max.max(dt_min),
        }
    }

    /// Starting pacing interval, a quarter of the way from dt_min to dt_max.
    pub fn initial_dt(&self) -> u32 {
        self.dt_min + self.dt_max.saturating_sub(self.dt_min) / 4
    }
}
