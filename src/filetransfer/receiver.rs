//! Receiver role state.

use super::message::{StatusReport, TransferStatus};
use super::negotiation::TransferParams;
use super::window::SlotWindow;
use crate::core::Tick;
use crate::core::constants::{STATUS_CHUNK_INTERVAL, STATUS_PERIOD_FACTOR};

/// Why a chunk was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkReject {
    /// Transfer is not running.
    NotRunning,
    /// Slot outside the window.
    OutOfWindow,
    /// Slot already stored.
    Duplicate,
    /// Length does not match the slot's share of the file.
    BadLength,
}

/// Receiver state of one transfer.
#[derive(Debug, Clone)]
pub struct ReceiverState {
    session: u16,
    file_len: u32,
    params: TransferParams,
    dt: u32,
    status: TransferStatus,
    window: SlotWindow,
    received: u32,
    /// Chunks since the last unsolicited status.
    chunks: u32,
    /// Link sequence of the last status sent.
    status_seq: Option<u8>,
    /// Final status could not be sent yet.
    final_pending: bool,
}

impl ReceiverState {
    /// Running state for an accepted transfer.
    pub fn new(session: u16, file_len: u32, params: TransferParams) -> Self {
        Self {
            session,
            file_len,
            params,
            dt: params.initial_dt(),
            status: TransferStatus::Ok,
            window: SlotWindow::new(),
            received: 0,
            chunks: 0,
            status_seq: None,
            final_pending: false,
        }
    }

    /// Session id.
    pub fn session(&self) -> u16 {
        self.session
    }

    /// Current status, [`TransferStatus::Ok`] while running.
    pub fn status(&self) -> TransferStatus {
        self.status
    }

    /// Whether chunks are accepted.
    pub fn is_running(&self) -> bool {
        self.status == TransferStatus::Ok
    }

    /// Negotiated parameters.
    pub fn params(&self) -> &TransferParams {
        &self.params
    }

    /// Pacing interval last reported by the sender.
    pub fn dt(&self) -> u32 {
        self.dt
    }

    /// File length.
    pub fn file_len(&self) -> u32 {
        self.file_len
    }

    /// Bytes stored.
    pub fn received(&self) -> u32 {
        self.received
    }

    /// Receive window.
    pub fn window(&self) -> &SlotWindow {
        &self.window
    }

    /// Whether every byte is stored.
    pub fn is_complete(&self) -> bool {
        self.received >= self.file_len
    }

    /// Period of the unsolicited status wakeup.
    pub fn status_period(&self) -> Tick {
        Tick::from(self.dt) * Tick::from(STATUS_PERIOD_FACTOR)
    }

    /// Count an arriving chunk. Returns true when a status report is due.
    pub fn note_chunk(&mut self) -> bool {
        self.chunks += 1;
        if self.chunks >= STATUS_CHUNK_INTERVAL {
            self.chunks = 0;
            true
        } else {
            false
        }
    }

    /// Validate a chunk for `slot` carrying `len` bytes. Returns its byte
    /// offset.
    pub fn check_chunk(&self, slot: u32, len: usize) -> Result<u32, ChunkReject> {
        if !self.is_running() {
            return Err(ChunkReject::NotRunning);
        }
        if !self.window.contains(slot) {
            return Err(ChunkReject::OutOfWindow);
        }
        if self.window.is_set(slot) {
            return Err(ChunkReject::Duplicate);
        }
        let mtu = u64::from(self.params.mtu);
        let offset = u64::from(slot) * mtu;
        let file_len = u64::from(self.file_len);
        if offset >= file_len || len as u64 != (file_len - offset).min(mtu) {
            return Err(ChunkReject::BadLength);
        }
        Ok(offset as u32)
    }

    /// Record a stored chunk.
    pub fn commit_chunk(&mut self, slot: u32, len: usize) {
        if self.window.mark_received(slot) {
            self.received = self.received.saturating_add(len as u32);
        }
    }

    /// End the transfer with `status`.
    pub fn finish(&mut self, status: TransferStatus) {
        self.status = status;
    }

    /// Window report for the sender.
    pub fn report(&self) -> StatusReport {
        StatusReport {
            session: self.session,
            status: self.status,
            base: self.window.base(),
            mask: self.window.mask(),
        }
    }

    /// Remember the link sequence of a status report just sent.
    pub fn status_sent(&mut self, seq: u8) {
        self.status_seq = Some(seq);
        self.final_pending = false;
    }

    /// Whether `seq` acknowledges the last status report.
    pub fn is_status_ack(&self, seq: u8) -> bool {
        self.status_seq == Some(seq)
    }

    /// Mark the final status as not yet sent.
    pub fn defer_final(&mut self) {
        self.final_pending = true;
    }

    /// Whether the final status still has to go out.
    pub fn final_pending(&self) -> bool {
        self.final_pending
    }

    /// Store the sender's pacing interval.
    pub fn set_dt(&mut self, dt: u32) {
        self.dt = dt;
    }
}
