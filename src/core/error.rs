//! Error types for the link and file-transfer layers.

use thiserror::Error;

use super::constants::{
    NACK_ERR_BAD_CRC, NACK_ERR_NOT_PREAMBLE, NACK_ERR_NOT_READY, NACK_ERR_RX_TIMEOUT,
};

/// Errors returned by the link send primitives.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// A synchronized frame is already waiting for its ack.
    #[error("synchronized send already outstanding")]
    Busy,

    /// Payload does not fit in one frame.
    #[error("payload too long: {len} bytes (max 768)")]
    TooLong {
        /// Offending payload length.
        len: usize,
    },

    /// `reply_ack` called outside the handling of an inbound synchronized frame.
    #[error("no inbound synchronized frame to acknowledge")]
    WrongState,
}

impl LinkError {
    /// Whether the caller may simply retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LinkError::Busy)
    }
}

/// Error codes carried by a NACK frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NackCode {
    /// Garbage where a preamble was expected.
    NotPreamble,
    /// CRC mismatch.
    BadCrc,
    /// Frame did not complete in time.
    RxTimeout,
    /// Receiver not ready.
    NotReady,
    /// Code not known to this implementation.
    Other(u8),
}

impl NackCode {
    /// Parse a NACK code byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            NACK_ERR_NOT_PREAMBLE => Self::NotPreamble,
            NACK_ERR_BAD_CRC => Self::BadCrc,
            NACK_ERR_RX_TIMEOUT => Self::RxTimeout,
            NACK_ERR_NOT_READY => Self::NotReady,
            other => Self::Other(other),
        }
    }

    /// Wire representation.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::NotPreamble => NACK_ERR_NOT_PREAMBLE,
            Self::BadCrc => NACK_ERR_BAD_CRC,
            Self::RxTimeout => NACK_ERR_RX_TIMEOUT,
            Self::NotReady => NACK_ERR_NOT_READY,
            Self::Other(b) => b,
        }
    }

    /// Codes that make the sender retransmit immediately.
    pub fn triggers_retransmit(self) -> bool {
        matches!(self, Self::BadCrc | Self::RxTimeout)
    }
}

/// Errors from one-shot decoding of a complete frame buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// No preamble byte in the input.
    #[error("no preamble found")]
    NoPreamble,

    /// Input ended before the frame was complete.
    #[error("frame incomplete")]
    Incomplete,

    /// CRC mismatch.
    #[error("bad crc on frame seq {seq}")]
    BadCrc {
        /// Sequence number declared in the header.
        seq: u8,
    },

    /// Payload exceeds the frame limit.
    #[error("payload too long: {len} bytes")]
    TooLong {
        /// Offending payload length.
        len: usize,
    },
}

/// Errors from parsing file-transfer payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Payload shorter than the message requires.
    #[error("message too short: expected {expected}, got {actual}")]
    TooShort {
        /// Minimum bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// First byte is not the expected command.
    #[error("unexpected command: 0x{0:02x}")]
    UnexpectedCommand(u8),

    /// Filename longer than 255 bytes.
    #[error("filename too long: {0} bytes (max 255)")]
    FilenameTooLong(usize),
}

/// Errors reported by a storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the file-transfer entry points.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Link refused the frame.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// Message could not be built or parsed.
    #[error("message error: {0}")]
    Message(#[from] MessageError),

    /// A transfer is already in progress on this endpoint.
    #[error("transfer session already active")]
    SessionActive,
}
