//! Simulated channel shared by the integration tests.
//!
//! Two endpoints run on one virtual clock. Frames are delivered with zero
//! latency through a per-frame filter that can drop them. Time only moves
//! when nothing is in flight, straight to the earliest pending wakeup.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use microlink::link::{Frame, LinkConfig, LinkEngine};
use microlink::{LinkHandler, LinkPlatform, Tick};

/// Shared virtual clock.
#[derive(Debug, Clone, Default)]
pub struct Clock(Rc<Cell<Tick>>);

impl Clock {
    pub fn now(&self) -> Tick {
        self.0.get()
    }

    pub fn set(&self, now: Tick) {
        self.0.set(now);
    }

    pub fn advance(&self, delta: Tick) {
        self.0.set(self.0.get() + delta);
    }
}

/// Link platform recording its single wakeup and every transmitted frame.
#[derive(Debug)]
pub struct SimPlatform {
    clock: Clock,
    /// Absolute deadline of the pending wakeup.
    pub wakeup: Option<Tick>,
    /// Frames not yet delivered.
    pub outbox: Vec<Vec<u8>>,
    /// Every frame ever transmitted.
    pub sent: Vec<Vec<u8>>,
}

impl SimPlatform {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            wakeup: None,
            outbox: Vec::new(),
            sent: Vec::new(),
        }
    }

    /// Transmitted frames, decoded.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent
            .iter()
            .map(|bytes| Frame::decode(bytes).expect("own frames decode"))
            .collect()
    }
}

impl LinkPlatform for SimPlatform {
    fn request_wakeup(&mut self, delta: Tick) {
        assert!(self.wakeup.is_none(), "second wakeup requested while one is pending");
        self.wakeup = Some(self.clock.now() + delta);
    }

    fn cancel_wakeup(&mut self) {
        self.wakeup = None;
    }

    fn now(&self) -> Tick {
        self.clock.now()
    }

    fn transmit(&mut self, bytes: &[u8]) {
        self.outbox.push(bytes.to_vec());
        self.sent.push(bytes.to_vec());
    }
}

/// Link engine on the simulated channel.
pub fn engine(clock: &Clock, config: LinkConfig) -> LinkEngine<SimPlatform> {
    LinkEngine::new(SimPlatform::new(clock.clone()), config)
}

/// Fire the link wakeup of `link` if it is due at `now`.
pub fn fire_link_if_due<H: LinkHandler + ?Sized>(
    link: &mut LinkEngine<SimPlatform>,
    handler: &mut H,
    now: Tick,
) -> bool {
    if link.platform().wakeup.is_some_and(|at| at <= now) {
        link.platform_mut().wakeup = None;
        link.on_timer_fire(handler);
        true
    } else {
        false
    }
}

/// Frames waiting in the outbox of `link`, in order.
pub fn drain(link: &mut LinkEngine<SimPlatform>) -> Vec<Vec<u8>> {
    std::mem::take(&mut link.platform_mut().outbox)
}

/// Direction of a frame between endpoints `a` and `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    AtoB,
    BtoA,
}

#[cfg(feature = "filetransfer")]
pub use transfer::*;

#[cfg(feature = "filetransfer")]
mod transfer {
    use super::*;

    use microlink::filetransfer::{
        Command, DataChunk, FileTransfer, MemoryStorage, SessionIdGenerator, TransferConfig,
        TransferEvents, TransferStatus,
    };

    /// Transfer hooks recording the wakeup and every final status.
    #[derive(Debug)]
    pub struct SimEvents {
        clock: Clock,
        pub wakeup: Option<Tick>,
        pub statuses: Vec<TransferStatus>,
    }

    impl TransferEvents for SimEvents {
        fn request_wakeup(&mut self, delta: Tick) {
            self.wakeup = Some(self.clock.now() + delta);
        }

        fn cancel_wakeup(&mut self) {
            self.wakeup = None;
        }

        fn on_status(&mut self, status: TransferStatus) {
            self.statuses.push(status);
        }
    }

    /// One side of a transfer: link engine plus transfer endpoint.
    pub struct Endpoint {
        pub link: LinkEngine<SimPlatform>,
        pub transfer: FileTransfer<MemoryStorage, SimEvents>,
    }

    impl Endpoint {
        pub fn new(
            clock: &Clock,
            config: TransferConfig,
            storage: MemoryStorage,
            seed: u64,
        ) -> Self {
            let events = SimEvents {
                clock: clock.clone(),
                wakeup: None,
                statuses: Vec::new(),
            };
            Self {
                link: engine(clock, LinkConfig::default()),
                transfer: FileTransfer::new(config, storage, events)
                    .with_session_ids(SessionIdGenerator::seeded(seed)),
            }
        }

        pub fn statuses(&self) -> &[TransferStatus] {
            &self.transfer.events().statuses
        }

        fn next_wakeup(&self) -> Option<Tick> {
            let link = self.link.platform().wakeup;
            let transfer = self.transfer.events().wakeup;
            match (link, transfer) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            }
        }

        fn fire_due(&mut self, now: Tick) {
            fire_link_if_due(&mut self.link, &mut self.transfer, now);
            if self.transfer.events().wakeup.is_some_and(|at| at <= now) {
                self.transfer.events_mut().wakeup = None;
                self.transfer.on_wakeup(&mut self.link);
            }
        }
    }

    /// Decides per frame whether it is lost.
    pub type DropFilter = Box<dyn FnMut(Dir, &Frame) -> bool>;

    /// Two endpoints, `a` and `b`, on a simulated channel.
    pub struct Pair {
        pub clock: Clock,
        pub a: Endpoint,
        pub b: Endpoint,
        pub filter: DropFilter,
        /// Every frame put on the channel, dropped or not.
        pub log: Vec<(Dir, Frame, bool)>,
    }

    impl Pair {
        pub fn new(
            a: TransferConfig,
            a_storage: MemoryStorage,
            b: TransferConfig,
            b_storage: MemoryStorage,
        ) -> Self {
            let clock = Clock::default();
            Self {
                a: Endpoint::new(&clock, a, a_storage, 1),
                b: Endpoint::new(&clock, b, b_storage, 2),
                clock,
                filter: Box::new(|_: Dir, _: &Frame| false),
                log: Vec::new(),
            }
        }

        pub fn with_filter(mut self, filter: impl FnMut(Dir, &Frame) -> bool + 'static) -> Self {
            self.filter = Box::new(filter);
            self
        }

        /// Deliver frames until both outboxes are empty.
        pub fn deliver(&mut self) {
            loop {
                let a_out = drain(&mut self.a.link);
                let b_out = drain(&mut self.b.link);
                if a_out.is_empty() && b_out.is_empty() {
                    return;
                }
                for bytes in a_out {
                    if self.pass(Dir::AtoB, &bytes) {
                        self.b.link.on_bytes(&bytes, &mut self.b.transfer);
                    }
                }
                for bytes in b_out {
                    if self.pass(Dir::BtoA, &bytes) {
                        self.a.link.on_bytes(&bytes, &mut self.a.transfer);
                    }
                }
            }
        }

        fn pass(&mut self, dir: Dir, bytes: &[u8]) -> bool {
            let frame = Frame::decode(bytes).expect("endpoints send valid frames");
            let dropped = (self.filter)(dir, &frame);
            self.log.push((dir, frame, dropped));
            !dropped
        }

        /// Run until `done` holds, nothing is pending, or `limit` ticks pass.
        /// Returns whether `done` held.
        pub fn run_until(&mut self, limit: Tick, mut done: impl FnMut(&Pair) -> bool) -> bool {
            let deadline = self.clock.now() + limit;
            loop {
                self.deliver();
                if done(&*self) {
                    return true;
                }
                let next = match (self.a.next_wakeup(), self.b.next_wakeup()) {
                    (Some(a), Some(b)) => a.min(b),
                    (Some(a), None) => a,
                    (None, Some(b)) => b,
                    (None, None) => return false,
                };
                if next > deadline {
                    return false;
                }
                self.clock.set(next.max(self.clock.now()));
                let now = self.clock.now();
                self.a.fire_due(now);
                self.b.fire_due(now);
            }
        }

        /// Run until both sides reported a final status.
        pub fn run_to_end(&mut self, limit: Tick) -> bool {
            self.run_until(limit, |pair| {
                !pair.a.statuses().is_empty() && !pair.b.statuses().is_empty()
            })
        }

        /// Frames sent in `dir` that were not dropped.
        pub fn delivered(&self, dir: Dir) -> impl Iterator<Item = &Frame> {
            self.log
                .iter()
                .filter(move |(d, _, dropped)| *d == dir && !dropped)
                .map(|(_, frame, _)| frame)
        }
    }

    /// Slot of a DataChunk frame, if `frame` is one.
    pub fn chunk_slot(frame: &Frame) -> Option<u32> {
        if Command::of(&frame.payload) != Some(Command::DataChunk) {
            return None;
        }
        DataChunk::from_bytes(&frame.payload).ok().map(|chunk| chunk.slot)
    }

    /// Session id of a DataChunk frame, if `frame` is one.
    pub fn chunk_session(frame: &Frame) -> Option<u16> {
        if Command::of(&frame.payload) != Some(Command::DataChunk) {
            return None;
        }
        DataChunk::from_bytes(&frame.payload).ok().map(|chunk| chunk.session)
    }

    /// Deterministic test file contents.
    pub fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
    }
}
