//! 32-slot selective-repeat window.
//!
//! `base` is the first slot not yet complete. Bit `i` of `mask` marks slot
//! `base + i`. On the receiver a set bit means "written"; on the sender it
//! means "sent, not yet reported". The receiver never leaves bit 0 set: a
//! completed prefix is folded into `base`.

use crate::core::constants::WINDOW_SLOTS;

/// Window base and slot bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotWindow {
    base: u32,
    mask: u32,
}

impl SlotWindow {
    /// Empty window at slot 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Window from reported parts.
    pub fn from_parts(base: u32, mask: u32) -> Self {
        Self { base, mask }
    }

    /// First slot of the window.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Slot bitmask.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Whether `slot` lies in `[base, base + 32)`.
    pub fn contains(&self, slot: u32) -> bool {
        slot >= self.base && u64::from(slot) < u64::from(self.base) + u64::from(WINDOW_SLOTS)
    }

    /// Whether `slot` is inside the window and marked.
    pub fn is_set(&self, slot: u32) -> bool {
        self.contains(slot) && self.mask & (1 << (slot - self.base)) != 0
    }

    /// Mark `slot` without sliding. Out-of-window slots are ignored.
    pub fn set(&mut self, slot: u32) {
        if self.contains(slot) {
            self.mask |= 1 << (slot - self.base);
        }
    }

    /// Mark `slot` as received and fold a complete prefix into `base`.
    ///
    /// Returns false if `slot` was outside the window.
    pub fn mark_received(&mut self, slot: u32) -> bool {
        if !self.contains(slot) {
            return false;
        }
        self.mask |= 1 << (slot - self.base);
        let run = self.mask.trailing_ones();
        self.base = self.base.saturating_add(run);
        self.mask = if run >= WINDOW_SLOTS { 0 } else { self.mask >> run };
        true
    }

    /// Index of the first unmarked slot of the window, relative to `base`.
    pub fn first_unset(&self) -> Option<u32> {
        let index = self.mask.trailing_ones();
        (index < WINDOW_SLOTS).then_some(index)
    }

    /// Slots completed in `self` that were not complete in `previous`.
    ///
    /// Slots that slid out of `previous` count unless they were already
    /// marked in it. A report older than `previous` counts nothing.
    pub fn newly_acked_since(&self, previous: &SlotWindow) -> u32 {
        if self.base < previous.base {
            return 0;
        }
        let shift = self.base - previous.base;
        let slid_mask = if shift >= WINDOW_SLOTS { u32::MAX } else { (1u32 << shift) - 1 };
        let slid = shift - (previous.mask & slid_mask).count_ones();
        let carried = if shift >= WINDOW_SLOTS { 0 } else { previous.mask >> shift };
        slid + (self.mask & !carried).count_ones()
    }
}
