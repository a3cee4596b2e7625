//! Frame encoding for the link layer.
//!
//! Wire format:
//! ```text
//! +----------+---------------------------+-----------+---------+---------+
//! | Preamble | Kind | Seq    | Band      | (LenByte) | Payload | CRC16   |
//! | 0xFD     | 2 b  | 4 b    | 2 b       | (1 byte)  | 0..768  | BE      |
//! +----------+---------------------------+-----------+---------+---------+
//! ```
//!
//! Band 0 means an empty payload and no length byte. Band `b` in 1..=3 means
//! `len = (b - 1) * 256 + len_byte + 1`. The CRC-16/CCITT (init 0xFFFF)
//! covers every header byte and the payload, not the preamble.

use crc::{CRC_16_IBM_3740, Crc};

use super::decoder::{Decoded, FrameDecoder};
use crate::core::FrameError;
use crate::core::constants::{MAX_FRAME_LEN, MAX_PAYLOAD_LEN, PREAMBLE};

/// CRC-16/CCITT with initial value 0xFFFF, unreflected, no final xor.
pub static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Frame kinds, encoded in the top two header bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Data frame that needs no acknowledgment.
    NotSync = 0,
    /// Data frame that must be acknowledged.
    Sync = 1,
    /// Positive acknowledgment.
    Ack = 2,
    /// Negative acknowledgment, payload is one error code byte.
    Nack = 3,
}

impl FrameKind {
    /// Parse the kind from the two low bits of `bits`.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::NotSync,
            1 => Self::Sync,
            2 => Self::Ack,
            _ => Self::Nack,
        }
    }

    /// Two-bit wire value.
    pub fn as_bits(self) -> u8 {
        self as u8
    }

    /// Whether this is a data frame (Sync or NotSync).
    pub fn is_data(self) -> bool {
        matches!(self, Self::NotSync | Self::Sync)
    }
}

/// Length band and optional length byte for a payload length.
fn length_header(len: usize) -> (u8, Option<u8>) {
    if len == 0 {
        (0, None)
    } else {
        let n = len - 1;
        (((n >> 8) + 1) as u8, Some((n & 0xFF) as u8))
    }
}

/// Encode a frame, appending its wire bytes to `out`.
pub fn encode_into(
    kind: FrameKind,
    seq: u8,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::TooLong { len: payload.len() });
    }

    let (band, len_byte) = length_header(payload.len());
    let header = (kind.as_bits() << 6) | ((seq & 0x0F) << 2) | band;

    let mut digest = CRC16.digest();
    out.push(PREAMBLE);
    out.push(header);
    digest.update(&[header]);
    if let Some(len_byte) = len_byte {
        out.push(len_byte);
        digest.update(&[len_byte]);
    }
    out.extend_from_slice(payload);
    digest.update(payload);
    out.extend_from_slice(&digest.finalize().to_be_bytes());
    Ok(())
}

/// An owned link frame.
///
/// The CRC only exists on the wire: [`encode`](Frame::encode) appends it and
/// [`decode`](Frame::decode) verifies and strips it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind.
    pub kind: FrameKind,
    /// Sequence number (0..=15).
    pub seq: u8,
    /// Payload (0..=768 bytes).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame.
    pub fn new(kind: FrameKind, seq: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            seq: seq & 0x0F,
            payload: payload.into(),
        }
    }

    /// Wire size of this frame.
    pub fn wire_size(&self) -> usize {
        let len_byte = usize::from(!self.payload.is_empty());
        1 + 1 + len_byte + self.payload.len() + 2
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut out = Vec::with_capacity(self.wire_size().min(MAX_FRAME_LEN));
        encode_into(self.kind, self.seq, &self.payload, &mut out)?;
        Ok(out)
    }

    /// Decode the first complete frame in `bytes`.
    ///
    /// Bytes before the first preamble are skipped.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let mut decoder = FrameDecoder::new();
        let mut seen_preamble = false;
        for &byte in bytes {
            match decoder.push(byte) {
                Decoded::FrameStart { .. } => seen_preamble = true,
                Decoded::Complete => {
                    let frame = decoder.frame();
                    return Ok(Self::new(frame.kind, frame.seq, frame.payload));
                }
                Decoded::BadCrc { seq } => return Err(FrameError::BadCrc { seq }),
                Decoded::Pending | Decoded::NonProtocol(_) => {}
            }
        }
        if seen_preamble {
            Err(FrameError::Incomplete)
        } else {
            Err(FrameError::NoPreamble)
        }
    }
}
