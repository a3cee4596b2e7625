//! File-transfer payloads carried inside link frames.
//!
//! Every payload starts with a command byte. Integers are big-endian.
//!
//! ```text
//! SendFile     sender -> receiver (sync)
//! | 0x10 | file_len:4 | mtu:2 | dt_min:4 | dt_max:4 | name_len:1 | name |
//! SendFile ack receiver -> sender
//! | 0x10 | status:1 | mtu:2 | dt_min:4 | dt_max:4 | session:2 |
//! DataChunk    sender -> receiver (unsync)
//! | 0x11 | session:2 | slot:4 | data |
//! Status       receiver -> sender (sync)
//! | 0x12 | session:2 | status:1 | base:4 | mask:4 |
//! Status ack   sender -> receiver
//! | 0x12 | status:1 | dt:4 |
//! ```

use crate::core::MessageError;
use crate::core::constants::{
    CMD_DATA_CHUNK, CMD_SEND_FILE, CMD_STATUS, DATA_CHUNK_HEADER_LEN, MAX_FILENAME_LEN,
    SEND_FILE_ACK_LEN, SEND_FILE_HEADER_LEN, STA_ABORTED, STA_FINISHED, STA_OK, STATUS_ACK_LEN,
    STATUS_REPORT_LEN,
};

/// Command byte of a file-transfer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Handshake.
    SendFile = CMD_SEND_FILE,
    /// File data.
    DataChunk = CMD_DATA_CHUNK,
    /// Window report and its reply.
    Status = CMD_STATUS,
}

impl Command {
    /// Parse a command byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CMD_SEND_FILE => Some(Self::SendFile),
            CMD_DATA_CHUNK => Some(Self::DataChunk),
            CMD_STATUS => Some(Self::Status),
            _ => None,
        }
    }

    /// Command of a payload, if it has one.
    pub fn of(payload: &[u8]) -> Option<Self> {
        payload.first().copied().and_then(Self::from_byte)
    }
}

/// Transfer status as carried on the wire and reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    /// Continue.
    Ok,
    /// All bytes delivered.
    Finished,
    /// Stopped by either side.
    Aborted,
}

impl TransferStatus {
    /// Parse a status byte. Unknown codes read as [`Aborted`](Self::Aborted).
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            STA_OK => Self::Ok,
            STA_FINISHED => Self::Finished,
            _ => Self::Aborted,
        }
    }

    /// Wire representation.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Ok => STA_OK,
            Self::Finished => STA_FINISHED,
            Self::Aborted => STA_ABORTED,
        }
    }
}

fn check_header(payload: &[u8], command: Command, min_len: usize) -> Result<(), MessageError> {
    if payload.len() < min_len {
        return Err(MessageError::TooShort {
            expected: min_len,
            actual: payload.len(),
        });
    }
    if payload[0] != command as u8 {
        return Err(MessageError::UnexpectedCommand(payload[0]));
    }
    Ok(())
}

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([b[at], b[at + 1]])
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

/// Sender's file offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFileRequest {
    /// File length in bytes.
    pub file_len: u32,
    /// Suggested chunk size, 0 for no preference.
    pub mtu: u16,
    /// Suggested lower pacing bound, 0 for no preference.
    pub dt_min: u32,
    /// Suggested upper pacing bound, 0 for no preference.
    pub dt_max: u32,
    /// Filename, at most 255 bytes.
    pub name: Vec<u8>,
}

impl SendFileRequest {
    /// Serialize.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        if self.name.len() > MAX_FILENAME_LEN {
            return Err(MessageError::FilenameTooLong(self.name.len()));
        }
        let mut buf = Vec::with_capacity(SEND_FILE_HEADER_LEN + self.name.len());
        buf.push(CMD_SEND_FILE);
        buf.extend_from_slice(&self.file_len.to_be_bytes());
        buf.extend_from_slice(&self.mtu.to_be_bytes());
        buf.extend_from_slice(&self.dt_min.to_be_bytes());
        buf.extend_from_slice(&self.dt_max.to_be_bytes());
        buf.push(self.name.len() as u8);
        buf.extend_from_slice(&self.name);
        Ok(buf)
    }

    /// Parse.
    pub fn from_bytes(b: &[u8]) -> Result<Self, MessageError> {
        check_header(b, Command::SendFile, SEND_FILE_HEADER_LEN)?;
        let name_len = usize::from(b[15]);
        let end = SEND_FILE_HEADER_LEN + name_len;
        if b.len() < end {
            return Err(MessageError::TooShort {
                expected: end,
                actual: b.len(),
            });
        }
        Ok(Self {
            file_len: u32_at(b, 1),
            mtu: u16_at(b, 5),
            dt_min: u32_at(b, 7),
            dt_max: u32_at(b, 11),
            name: b[SEND_FILE_HEADER_LEN..end].to_vec(),
        })
    }

    /// Filename as text, invalid UTF-8 replaced.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Receiver's answer to a [`SendFileRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendFileAck {
    /// Accept ([`TransferStatus::Ok`]) or refuse.
    pub status: TransferStatus,
    /// Negotiated chunk size.
    pub mtu: u16,
    /// Negotiated lower pacing bound.
    pub dt_min: u32,
    /// Negotiated upper pacing bound.
    pub dt_max: u32,
    /// Session id for all further frames.
    pub session: u16,
}

impl SendFileAck {
    /// Serialize.
    pub fn to_bytes(&self) -> [u8; SEND_FILE_ACK_LEN] {
        let mut buf = [0u8; SEND_FILE_ACK_LEN];
        buf[0] = CMD_SEND_FILE;
        buf[1] = self.status.as_byte();
        buf[2..4].copy_from_slice(&self.mtu.to_be_bytes());
        buf[4..8].copy_from_slice(&self.dt_min.to_be_bytes());
        buf[8..12].copy_from_slice(&self.dt_max.to_be_bytes());
        buf[12..14].copy_from_slice(&self.session.to_be_bytes());
        buf
    }

    /// Parse.
    pub fn from_bytes(b: &[u8]) -> Result<Self, MessageError> {
        check_header(b, Command::SendFile, SEND_FILE_ACK_LEN)?;
        Ok(Self {
            status: TransferStatus::from_byte(b[1]),
            mtu: u16_at(b, 2),
            dt_min: u32_at(b, 4),
            dt_max: u32_at(b, 8),
            session: u16_at(b, 12),
        })
    }
}

/// One slot of file data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChunk<'a> {
    /// Session id.
    pub session: u16,
    /// Absolute slot index, in mtu units.
    pub slot: u32,
    /// Chunk bytes.
    pub data: &'a [u8],
}

impl<'a> DataChunk<'a> {
    /// Append the serialized chunk to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(DATA_CHUNK_HEADER_LEN + self.data.len());
        out.push(CMD_DATA_CHUNK);
        out.extend_from_slice(&self.session.to_be_bytes());
        out.extend_from_slice(&self.slot.to_be_bytes());
        out.extend_from_slice(self.data);
    }

    /// Serialize.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Parse, borrowing the data from `b`.
    pub fn from_bytes(b: &'a [u8]) -> Result<Self, MessageError> {
        check_header(b, Command::DataChunk, DATA_CHUNK_HEADER_LEN)?;
        Ok(Self {
            session: u16_at(b, 1),
            slot: u32_at(b, 3),
            data: &b[DATA_CHUNK_HEADER_LEN..],
        })
    }
}

/// Receiver's window report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// Session id.
    pub session: u16,
    /// Receiver status.
    pub status: TransferStatus,
    /// First slot not yet received.
    pub base: u32,
    /// Received slots above `base`, bit `i` is slot `base + i`.
    pub mask: u32,
}

impl StatusReport {
    /// Serialize.
    pub fn to_bytes(&self) -> [u8; STATUS_REPORT_LEN] {
        let mut buf = [0u8; STATUS_REPORT_LEN];
        buf[0] = CMD_STATUS;
        buf[1..3].copy_from_slice(&self.session.to_be_bytes());
        buf[3] = self.status.as_byte();
        buf[4..8].copy_from_slice(&self.base.to_be_bytes());
        buf[8..12].copy_from_slice(&self.mask.to_be_bytes());
        buf
    }

    /// Parse.
    pub fn from_bytes(b: &[u8]) -> Result<Self, MessageError> {
        check_header(b, Command::Status, STATUS_REPORT_LEN)?;
        Ok(Self {
            session: u16_at(b, 1),
            status: TransferStatus::from_byte(b[3]),
            base: u32_at(b, 4),
            mask: u32_at(b, 8),
        })
    }
}

/// Sender's reply to a [`StatusReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusAck {
    /// Sender status.
    pub status: TransferStatus,
    /// Sender's current pacing interval.
    pub dt: u32,
}

impl StatusAck {
    /// Serialize.
    pub fn to_bytes(&self) -> [u8; STATUS_ACK_LEN] {
        let mut buf = [0u8; STATUS_ACK_LEN];
        buf[0] = CMD_STATUS;
        buf[1] = self.status.as_byte();
        buf[2..6].copy_from_slice(&self.dt.to_be_bytes());
        buf
    }

    /// Parse.
    pub fn from_bytes(b: &[u8]) -> Result<Self, MessageError> {
        check_header(b, Command::Status, STATUS_ACK_LEN)?;
        Ok(Self {
            status: TransferStatus::from_byte(b[1]),
            dt: u32_at(b, 2),
        })
    }
}
