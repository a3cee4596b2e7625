//! Two logical deadlines multiplexed onto one host wakeup.
//!
//! The host offers a single pending wakeup. The engine needs two: the rx
//! deadline (a frame must complete in time) and the ack deadline (retry an
//! unacknowledged frame). Both are kept as remaining deltas that are settled
//! against the host clock whenever one of them changes, and the host wakeup
//! always targets the sooner of the two.

use crate::core::{LinkPlatform, Tick};

/// Which logical deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSlot {
    /// Inbound frame must complete.
    Rx,
    /// Outstanding synchronized frame must be acknowledged.
    Ack,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Deadline {
    enabled: bool,
    remaining: Tick,
    armed_at: Tick,
}

impl Deadline {
    fn settle(&mut self, now: Tick) {
        if self.enabled {
            let elapsed = now.saturating_sub(self.armed_at);
            self.remaining = self.remaining.saturating_sub(elapsed);
            self.armed_at = now;
        }
    }
}

/// Deadlines that elapsed on a host wakeup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expired {
    /// The rx deadline elapsed.
    pub rx: bool,
    /// The ack deadline elapsed.
    pub ack: bool,
}

/// Timer multiplexer state.
#[derive(Debug, Clone, Default)]
pub struct TimerMux {
    rx: Deadline,
    ack: Deadline,
    /// A host wakeup is pending.
    scheduled: bool,
}

impl TimerMux {
    /// Create with both deadlines disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `slot` is armed.
    pub fn is_armed(&self, slot: TimerSlot) -> bool {
        self.deadline(slot).enabled
    }

    /// Remaining ticks of `slot` as of its last settle.
    pub fn remaining(&self, slot: TimerSlot) -> Option<Tick> {
        let deadline = self.deadline(slot);
        deadline.enabled.then_some(deadline.remaining)
    }

    /// Whether a host wakeup is pending.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Arm `slot` to expire in `delta` ticks.
    pub fn arm<P: LinkPlatform + ?Sized>(&mut self, platform: &mut P, slot: TimerSlot, delta: Tick) {
        let now = platform.now();
        self.settle(now);
        *self.deadline_mut(slot) = Deadline {
            enabled: true,
            remaining: delta,
            armed_at: now,
        };

        let other = *self.deadline(other_slot(slot));
        if self.scheduled && other.enabled && other.remaining <= delta {
            // The pending wakeup already comes first.
            return;
        }
        let next = if other.enabled { delta.min(other.remaining) } else { delta };
        self.schedule(platform, next);
    }

    /// Disarm `slot` and retarget the host wakeup at the remaining deadline.
    pub fn cancel<P: LinkPlatform + ?Sized>(&mut self, platform: &mut P, slot: TimerSlot) {
        if !self.deadline(slot).enabled {
            return;
        }
        self.settle(platform.now());
        let was = *self.deadline(slot);
        self.deadline_mut(slot).enabled = false;

        let other = *self.deadline(other_slot(slot));
        if !other.enabled {
            self.unschedule(platform);
        } else if !self.scheduled || other.remaining > was.remaining {
            self.schedule(platform, other.remaining);
        }
    }

    /// Disarm both deadlines and drop the host wakeup.
    pub fn cancel_all<P: LinkPlatform + ?Sized>(&mut self, platform: &mut P) {
        self.rx.enabled = false;
        self.ack.enabled = false;
        self.unschedule(platform);
    }

    /// Account for a host wakeup. Returns the deadlines that elapsed, which
    /// are disarmed. Call [`resume`](Self::resume) once they are handled.
    pub fn fire(&mut self, now: Tick) -> Expired {
        self.settle(now);
        self.scheduled = false;

        let mut expired = Expired::default();
        if self.rx.enabled && self.rx.remaining == 0 {
            self.rx.enabled = false;
            expired.rx = true;
        }
        if self.ack.enabled && self.ack.remaining == 0 {
            self.ack.enabled = false;
            expired.ack = true;
        }
        expired
    }

    /// Reschedule the host wakeup for any deadline still armed after
    /// [`fire`](Self::fire).
    pub fn resume<P: LinkPlatform + ?Sized>(&mut self, platform: &mut P) {
        if self.scheduled {
            return;
        }
        let next = [self.rx, self.ack]
            .iter()
            .filter(|d| d.enabled)
            .map(|d| d.remaining)
            .min();
        if let Some(delta) = next {
            self.schedule(platform, delta);
        }
    }

    fn settle(&mut self, now: Tick) {
        self.rx.settle(now);
        self.ack.settle(now);
    }

    fn schedule<P: LinkPlatform + ?Sized>(&mut self, platform: &mut P, delta: Tick) {
        if self.scheduled {
            platform.cancel_wakeup();
        }
        self.scheduled = true;
        platform.request_wakeup(delta);
    }

    fn unschedule<P: LinkPlatform + ?Sized>(&mut self, platform: &mut P) {
        if self.scheduled {
            platform.cancel_wakeup();
        }
        self.scheduled = false;
    }

    fn deadline(&self, slot: TimerSlot) -> &Deadline {
        match slot {
            TimerSlot::Rx => &self.rx,
            TimerSlot::Ack => &self.ack,
        }
    }

    fn deadline_mut(&mut self, slot: TimerSlot) -> &mut Deadline {
        match slot {
            TimerSlot::Rx => &mut self.rx,
            TimerSlot::Ack => &mut self.ack,
        }
    }
}

fn other_slot(slot: TimerSlot) -> TimerSlot {
    match slot {
        TimerSlot::Rx => TimerSlot::Ack,
        TimerSlot::Ack => TimerSlot::Rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records wakeup requests against a settable clock.
    #[derive(Default)]
    struct MockPlatform {
        now: Tick,
        pending: Option<Tick>,
        requests: u32,
        cancels: u32,
    }

    impl LinkPlatform for MockPlatform {
        fn request_wakeup(&mut self, delta: Tick) {
            assert!(self.pending.is_none(), "two wakeups pending");
            self.pending = Some(self.now + delta);
            self.requests += 1;
        }

        fn cancel_wakeup(&mut self) {
            self.pending = None;
            self.cancels += 1;
        }

        fn now(&self) -> Tick {
            self.now
        }

        fn transmit(&mut self, _bytes: &[u8]) {}
    }

    #[test]
    fn test_single_deadline() {
        let mut platform = MockPlatform::default();
        let mut timers = TimerMux::new();

        timers.arm(&mut platform, TimerSlot::Ack, 40);
        assert_eq!(platform.pending, Some(40));
        assert!(timers.is_armed(TimerSlot::Ack));

        platform.now = 40;
        platform.pending = None;
        let expired = timers.fire(platform.now);
        assert_eq!(expired, Expired { rx: false, ack: true });
        assert!(!timers.is_armed(TimerSlot::Ack));
        timers.resume(&mut platform);
        assert_eq!(platform.pending, None);
    }

    #[test]
    fn test_sooner_deadline_wins() {
        let mut platform = MockPlatform::default();
        let mut timers = TimerMux::new();

        timers.arm(&mut platform, TimerSlot::Rx, 800);
        assert_eq!(platform.pending, Some(800));

        platform.now = 100;
        timers.arm(&mut platform, TimerSlot::Ack, 40);
        assert_eq!(platform.pending, Some(140));
        assert_eq!(timers.remaining(TimerSlot::Rx), Some(700));
    }

    #[test]
    fn test_later_deadline_keeps_pending_wakeup() {
        let mut platform = MockPlatform::default();
        let mut timers = TimerMux::new();

        timers.arm(&mut platform, TimerSlot::Ack, 40);
        platform.now = 10;
        timers.arm(&mut platform, TimerSlot::Rx, 800);
        assert_eq!(platform.pending, Some(40));
        assert_eq!(platform.requests, 1);
    }

    #[test]
    fn test_cancel_retargets_other_deadline() {
        let mut platform = MockPlatform::default();
        let mut timers = TimerMux::new();

        timers.arm(&mut platform, TimerSlot::Rx, 800);
        timers.arm(&mut platform, TimerSlot::Ack, 40);
        platform.now = 20;
        timers.cancel(&mut platform, TimerSlot::Ack);
        assert_eq!(platform.pending, Some(800));

        timers.cancel(&mut platform, TimerSlot::Rx);
        assert_eq!(platform.pending, None);
        assert!(!timers.is_scheduled());
    }

    #[test]
    fn test_cancel_later_deadline_keeps_wakeup() {
        let mut platform = MockPlatform::default();
        let mut timers = TimerMux::new();

        timers.arm(&mut platform, TimerSlot::Ack, 40);
        timers.arm(&mut platform, TimerSlot::Rx, 800);
        let cancels = platform.cancels;
        timers.cancel(&mut platform, TimerSlot::Rx);
        assert_eq!(platform.pending, Some(40));
        assert_eq!(platform.cancels, cancels);
    }

    #[test]
    fn test_fire_resumes_lingering_deadline() {
        let mut platform = MockPlatform::default();
        let mut timers = TimerMux::new();

        timers.arm(&mut platform, TimerSlot::Rx, 100);
        timers.arm(&mut platform, TimerSlot::Ack, 40);

        platform.now = 40;
        platform.pending = None;
        let expired = timers.fire(platform.now);
        assert_eq!(expired, Expired { rx: false, ack: true });
        timers.resume(&mut platform);
        assert_eq!(platform.pending, Some(100));
    }

    #[test]
    fn test_late_fire_expires_both() {
        let mut platform = MockPlatform::default();
        let mut timers = TimerMux::new();

        timers.arm(&mut platform, TimerSlot::Rx, 50);
        timers.arm(&mut platform, TimerSlot::Ack, 40);
        platform.now = 500;
        platform.pending = None;
        assert_eq!(timers.fire(platform.now), Expired { rx: true, ack: true });
    }

    #[test]
    fn test_cancel_all() {
        let mut platform = MockPlatform::default();
        let mut timers = TimerMux::new();

        timers.arm(&mut platform, TimerSlot::Rx, 50);
        timers.arm(&mut platform, TimerSlot::Ack, 40);
        timers.cancel_all(&mut platform);
        assert_eq!(platform.pending, None);
        assert!(!timers.is_armed(TimerSlot::Rx));
        assert!(!timers.is_armed(TimerSlot::Ack));
    }
}
