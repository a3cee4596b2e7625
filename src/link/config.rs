//! Link engine configuration.

use crate::core::Tick;
use crate::core::constants::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_RX_TIMEOUT};

/// Retry and timeout settings of one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Retransmissions of a synchronized frame before `on_timeout`.
    pub retries: u32,
    /// Delay before the first retransmission.
    pub retry_delay: Tick,
    /// Added to the delay for every further attempt.
    pub retry_step: Tick,
    /// Ticks allowed between a preamble and the end of its frame.
    pub rx_timeout: Tick,
    /// Send a NotPreamble NACK when a frame follows non-protocol bytes.
    pub nack_garbage: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_step: 0,
            rx_timeout: DEFAULT_RX_TIMEOUT,
            nack_garbage: false,
        }
    }
}

impl LinkConfig {
    /// Create with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry limit.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the base retry delay.
    pub fn with_retry_delay(mut self, delay: Tick) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the per-attempt retry delay increment.
    pub fn with_retry_step(mut self, step: Tick) -> Self {
        self.retry_step = step;
        self
    }

    /// Set the inbound frame timeout.
    pub fn with_rx_timeout(mut self, timeout: Tick) -> Self {
        self.rx_timeout = timeout;
        self
    }

    /// Enable or disable NACKs on garbage.
    pub fn with_nack_garbage(mut self, enabled: bool) -> Self {
        self.nack_garbage = enabled;
        self
    }

    /// Delay before retransmission number `attempt + 1`.
    pub fn retry_delay_for(&self, attempt: u32) -> Tick {
        self.retry_delay
            .saturating_add(Tick::from(attempt).saturating_mul(self.retry_step))
    }
}
