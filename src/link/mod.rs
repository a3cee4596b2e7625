//! Link layer: framing, CRC, acknowledgment and retransmission.
//!
//! ```text
//! bytes in ──▶ FrameDecoder ──▶ LinkEngine ──▶ LinkHandler callbacks
//!                                   │
//!            LinkPlatform::transmit ◀┘ (data, acks, nacks, retransmits)
//! ```

mod config;
mod decoder;
mod engine;
mod frame;
mod timer;

pub use config::LinkConfig;
pub use decoder::{Decoded, FrameDecoder, FrameRef, RxState};
pub use engine::LinkEngine;
pub use frame::{CRC16, Frame, FrameKind, encode_into};
pub use timer::{Expired, TimerMux, TimerSlot};
