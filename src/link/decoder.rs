//! Incremental frame decoder.
//!
//! Consumes one byte at a time and never blocks. The running CRC is updated
//! per byte, so a frame is validated the moment its last CRC byte arrives.

use std::fmt;
use std::mem;

use crc::Digest;

use super::frame::{CRC16, FrameKind};
use crate::core::constants::{MAX_PAYLOAD_LEN, PREAMBLE};

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    /// Waiting for a preamble.
    AwaitPreamble,
    /// Inside non-protocol data, waiting for a preamble.
    NotPreamble,
    /// Expecting the kind/seq/band byte.
    HeaderHi,
    /// Expecting the length byte.
    HeaderLo,
    /// Collecting payload bytes.
    Data,
    /// Expecting the high CRC byte.
    CrcHi,
    /// Expecting the low CRC byte.
    CrcLo,
}

/// Result of pushing one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Byte consumed, nothing to report.
    Pending,
    /// Byte seen outside of any frame.
    NonProtocol(u8),
    /// A preamble opened a new frame.
    FrameStart {
        /// The preamble ended a run of non-protocol bytes.
        resynced: bool,
    },
    /// A frame with a valid CRC is available through [`FrameDecoder::frame`].
    Complete,
    /// A frame ended with a CRC mismatch.
    BadCrc {
        /// Sequence number declared in the corrupted header.
        seq: u8,
    },
}

/// Borrowed view of the last decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef<'a> {
    /// Frame kind.
    pub kind: FrameKind,
    /// Sequence number.
    pub seq: u8,
    /// Payload bytes.
    pub payload: &'a [u8],
}

/// Byte-at-a-time frame decoder.
pub struct FrameDecoder {
    state: RxState,
    kind: FrameKind,
    seq: u8,
    len: usize,
    payload: Vec<u8>,
    crc: Digest<'static, u16>,
    rx_crc: u16,
}

impl fmt::Debug for FrameDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameDecoder")
            .field("state", &self.state)
            .field("kind", &self.kind)
            .field("seq", &self.seq)
            .field("len", &self.len)
            .field("received", &self.payload.len())
            .finish()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder waiting for a preamble.
    pub fn new() -> Self {
        Self {
            state: RxState::AwaitPreamble,
            kind: FrameKind::NotSync,
            seq: 0,
            len: 0,
            payload: Vec::with_capacity(MAX_PAYLOAD_LEN),
            crc: CRC16.digest(),
            rx_crc: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> RxState {
        self.state
    }

    /// Sequence number of the frame being decoded, 0 before its header.
    pub fn seq(&self) -> u8 {
        self.seq
    }

    /// Whether a frame is partially decoded.
    pub fn in_frame(&self) -> bool {
        !matches!(self.state, RxState::AwaitPreamble | RxState::NotPreamble)
    }

    /// Drop any partial frame and wait for the next preamble.
    pub fn reset(&mut self) {
        self.state = RxState::AwaitPreamble;
        self.payload.clear();
        self.crc = CRC16.digest();
    }

    /// The last frame reported as [`Decoded::Complete`].
    ///
    /// Only meaningful until the next byte is pushed.
    pub fn frame(&self) -> FrameRef<'_> {
        FrameRef {
            kind: self.kind,
            seq: self.seq,
            payload: &self.payload,
        }
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> Decoded {
        match self.state {
            RxState::AwaitPreamble | RxState::NotPreamble => {
                if byte == PREAMBLE {
                    let resynced = self.state == RxState::NotPreamble;
                    self.start();
                    Decoded::FrameStart { resynced }
                } else {
                    self.state = RxState::NotPreamble;
                    Decoded::NonProtocol(byte)
                }
            }
            RxState::HeaderHi => {
                self.crc.update(&[byte]);
                self.kind = FrameKind::from_bits(byte >> 6);
                self.seq = (byte >> 2) & 0x0F;
                let band = usize::from(byte & 0x03);
                if band == 0 {
                    self.len = 0;
                    self.state = RxState::CrcHi;
                } else {
                    self.len = (band - 1) << 8;
                    self.state = RxState::HeaderLo;
                }
                Decoded::Pending
            }
            RxState::HeaderLo => {
                self.crc.update(&[byte]);
                self.len += usize::from(byte) + 1;
                self.state = RxState::Data;
                Decoded::Pending
            }
            RxState::Data => {
                self.crc.update(&[byte]);
                self.payload.push(byte);
                if self.payload.len() >= self.len {
                    self.state = RxState::CrcHi;
                }
                Decoded::Pending
            }
            RxState::CrcHi => {
                self.rx_crc = u16::from(byte) << 8;
                self.state = RxState::CrcLo;
                Decoded::Pending
            }
            RxState::CrcLo => {
                self.rx_crc |= u16::from(byte);
                self.state = RxState::AwaitPreamble;
                let local = mem::replace(&mut self.crc, CRC16.digest()).finalize();
                if local == self.rx_crc {
                    Decoded::Complete
                } else {
                    Decoded::BadCrc { seq: self.seq }
                }
            }
        }
    }

    fn start(&mut self) {
        self.seq = 0;
        self.len = 0;
        self.payload.clear();
        self.crc = CRC16.digest();
        self.state = RxState::HeaderHi;
    }
}
