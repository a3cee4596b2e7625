//! Protocol constants for the link and file-transfer layers.
//!
//! Wire values are fixed by the protocol and MUST NOT be changed. Defaults
//! can be overridden through [`LinkConfig`](crate::link::LinkConfig) and
//! `TransferConfig`.

use super::traits::Tick;

// =============================================================================
// FRAMING
// =============================================================================

/// First byte of every frame.
pub const PREAMBLE: u8 = 0xFD;

/// Maximum payload carried by one frame (band 3, length byte 0xFF).
///
/// Three bands of 256 lengths each plus the empty band give 769 distinct
/// lengths, 0..=768.
pub const MAX_PAYLOAD_LEN: usize = 768;

/// Largest on-wire frame: preamble + two header bytes + payload + CRC.
pub const MAX_FRAME_LEN: usize = 1 + 2 + MAX_PAYLOAD_LEN + 2;

/// Initial value of the running CRC-16/CCITT.
pub const CRC_INIT: u16 = 0xFFFF;

/// Highest synchronized sequence number. Sequence 0 is reserved for
/// unsynchronized frames and "unknown" acks/nacks.
pub const SEQ_MAX: u8 = 0x0F;

/// First sequence number handed out after init or reset.
pub const SEQ_FIRST: u8 = 1;

// =============================================================================
// NACK ERROR CODES
// =============================================================================

/// Garbage seen where a preamble was expected.
pub const NACK_ERR_NOT_PREAMBLE: u8 = 0x01;

/// Frame CRC mismatch.
pub const NACK_ERR_BAD_CRC: u8 = 0x02;

/// Frame did not complete within the rx timeout.
pub const NACK_ERR_RX_TIMEOUT: u8 = 0x03;

/// Receiver not ready.
pub const NACK_ERR_NOT_READY: u8 = 0x04;

// =============================================================================
// LINK TIMING DEFAULTS
// =============================================================================

/// Retransmissions of a synchronized frame before giving up.
pub const DEFAULT_RETRIES: u32 = 10;

/// Ticks between retransmissions of an unacknowledged frame.
pub const DEFAULT_RETRY_DELAY: Tick = 40;

/// Ticks allowed between a preamble and the last CRC byte.
pub const DEFAULT_RX_TIMEOUT: Tick = 2 * DEFAULT_RETRY_DELAY * DEFAULT_RETRIES as Tick;

// =============================================================================
// FILE TRANSFER COMMANDS
// =============================================================================

/// Handshake: sender offers a file.
pub const CMD_SEND_FILE: u8 = 0x10;

/// Unsynchronized file data.
pub const CMD_DATA_CHUNK: u8 = 0x11;

/// Receiver window report and the sender's pacing reply.
pub const CMD_STATUS: u8 = 0x12;

// =============================================================================
// FILE TRANSFER STATUS CODES
// =============================================================================

/// Transfer continues.
pub const STA_OK: u8 = 0x00;

/// All bytes received.
pub const STA_FINISHED: u8 = 0x01;

/// Transfer aborted by either side.
pub const STA_ABORTED: u8 = 0x02;

// =============================================================================
// FILE TRANSFER DEFAULTS
// =============================================================================

/// Chunk size used when neither side states a preference.
pub const DEFAULT_MTU: u16 = 250;

/// Lower pacing bound used when neither side states a preference.
pub const DEFAULT_DT_MIN: u32 = 7;

/// Upper pacing bound used when neither side states a preference.
pub const DEFAULT_DT_MAX: u32 = 10;

/// Sender pacing step.
pub const DEFAULT_DDT: u32 = 1;

/// Number of slots tracked by the selective-repeat window.
pub const WINDOW_SLOTS: u32 = 32;

/// Receiver sends an unsolicited status every this many chunks.
pub const STATUS_CHUNK_INTERVAL: u32 = 16;

/// Periodic status wakeup is `dt * STATUS_PERIOD_FACTOR`.
pub const STATUS_PERIOD_FACTOR: u32 = 16;

/// Sender wakeups with nothing left to send and no status report in
/// between before the sender gives up on a silent receiver.
pub const SENDER_IDLE_LIMIT: u32 = 8 * STATUS_PERIOD_FACTOR;

/// Rounds acknowledging at most this many chunks back the sender off.
pub const PACING_BACKOFF_THRESHOLD: u32 = 8;

/// Longest filename carried by a SendFile request.
pub const MAX_FILENAME_LEN: usize = 255;

/// Fixed part of a SendFile request (cmd + len + mtu + dt_min + dt_max + name len).
pub const SEND_FILE_HEADER_LEN: usize = 16;

/// SendFile acknowledgment size.
pub const SEND_FILE_ACK_LEN: usize = 14;

/// DataChunk header size (cmd + session + slot).
pub const DATA_CHUNK_HEADER_LEN: usize = 7;

/// Status report size.
pub const STATUS_REPORT_LEN: usize = 12;

/// Status acknowledgment size.
pub const STATUS_ACK_LEN: usize = 6;

/// Largest mtu that still fits a chunk into one frame.
pub const MAX_MTU: u16 = (MAX_PAYLOAD_LEN - DATA_CHUNK_HEADER_LEN) as u16;
