//! Sender pacing.
//!
//! Additive increase / additive decrease of the interval between chunks,
//! driven by how many chunks each status round acknowledged.

use super::negotiation::TransferParams;
use crate::core::constants::PACING_BACKOFF_THRESHOLD;

/// Interval between chunk sends, bounded by `[dt_min, dt_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    dt: u32,
    dt_min: u32,
    dt_max: u32,
    ddt: u32,
}

impl Pacer {
    /// Start at the initial interval for `params`.
    pub fn new(params: &TransferParams, ddt: u32) -> Self {
        Self {
            dt: params.initial_dt(),
            dt_min: params.dt_min,
            dt_max: params.dt_max,
            ddt,
        }
    }

    /// Current interval.
    pub fn dt(&self) -> u32 {
        self.dt
    }

    /// Lower bound.
    pub fn dt_min(&self) -> u32 {
        self.dt_min
    }

    /// Upper bound.
    pub fn dt_max(&self) -> u32 {
        self.dt_max
    }

    /// Adjust after a status round that acknowledged `newly_acked` chunks.
    ///
    /// Few acknowledgments slow the sender down, many speed it up.
    pub fn adjust(&mut self, newly_acked: u32) -> u32 {
        if newly_acked <= PACING_BACKOFF_THRESHOLD {
            self.dt = self.dt.saturating_add(self.ddt).min(self.dt_max);
        } else {
            let dt = if self.dt > self.ddt { self.dt - self.ddt } else { self.dt_min };
            self.dt = dt.max(self.dt_min);
        }
        self.dt
    }
}
