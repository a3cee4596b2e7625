//! File-transfer configuration.

use super::negotiation::TransferParams;
use crate::core::constants::DEFAULT_DDT;

/// Local preferences of one file-transfer endpoint.
///
/// Zero means "no preference" and lets the peer decide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Preferred chunk size.
    pub mtu: u16,
    /// Preferred lower pacing bound.
    pub dt_min: u32,
    /// Preferred upper pacing bound.
    pub dt_max: u32,
    /// Pacing step applied by the sender after each status round.
    pub ddt: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            mtu: 0,
            dt_min: 0,
            dt_max: 0,
            ddt: DEFAULT_DDT,
        }
    }
}

impl TransferConfig {
    /// Create with no preferences.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preferred chunk size.
    pub fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the preferred pacing bounds.
    pub fn with_dt_range(mut self, dt_min: u32, dt_max: u32) -> Self {
        self.dt_min = dt_min;
        self.dt_max = dt_max;
        self
    }

    /// Set the sender pacing step.
    pub fn with_ddt(mut self, ddt: u32) -> Self {
        self.ddt = ddt;
        self
    }

    /// Preferences as negotiable parameters.
    pub fn params(&self) -> TransferParams {
        TransferParams::new(self.mtu, self.dt_min, self.dt_max)
    }
}
