//! Sender role state.

use super::message::{SendFileAck, StatusAck, StatusReport, TransferStatus};
use super::negotiation::TransferParams;
use super::pacing::Pacer;
use super::window::SlotWindow;
use crate::core::constants::SENDER_IDLE_LIMIT;

/// Where a sender is in its transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderPhase {
    /// SendFile sent, waiting for the receiver's answer.
    Handshake {
        /// Link sequence number of the SendFile frame.
        request_seq: u8,
    },
    /// Sending chunks.
    Running,
    /// Ended with this status.
    Done(TransferStatus),
}

/// Next chunk to put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Absolute slot.
    pub slot: u32,
    /// Byte offset in the file.
    pub offset: u32,
    /// Chunk length.
    pub len: usize,
}

/// Sender state of one transfer.
#[derive(Debug, Clone)]
pub struct SenderState {
    file_len: u32,
    ddt: u32,
    phase: SenderPhase,
    session: u16,
    params: TransferParams,
    pacer: Pacer,
    /// Slots sent but not yet reported, on top of the last report.
    window: SlotWindow,
    /// Last window reported by the receiver.
    reported: SlotWindow,
    acked_bytes: u32,
    /// Wakeups with nothing to send since the last status report.
    idle_ticks: u32,
}

impl SenderState {
    /// State after sending a SendFile request with sequence `request_seq`.
    pub fn new(file_len: u32, proposed: TransferParams, ddt: u32, request_seq: u8) -> Self {
        let params = proposed.sanitized();
        Self {
            file_len,
            ddt,
            phase: SenderPhase::Handshake { request_seq },
            session: 0,
            params,
            pacer: Pacer::new(&params, ddt),
            window: SlotWindow::new(),
            reported: SlotWindow::new(),
            acked_bytes: 0,
            idle_ticks: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SenderPhase {
        self.phase
    }

    /// Whether chunks are being sent.
    pub fn is_running(&self) -> bool {
        self.phase == SenderPhase::Running
    }

    /// Whether the transfer has not ended yet.
    pub fn is_active(&self) -> bool {
        !matches!(self.phase, SenderPhase::Done(_))
    }

    /// Session id assigned by the receiver, 0 before the handshake completes.
    pub fn session(&self) -> u16 {
        self.session
    }

    /// Parameters in use.
    pub fn params(&self) -> &TransferParams {
        &self.params
    }

    /// Current pacing interval.
    pub fn dt(&self) -> u32 {
        self.pacer.dt()
    }

    /// File length.
    pub fn file_len(&self) -> u32 {
        self.file_len
    }

    /// Bytes the receiver reported as stored.
    pub fn acked_bytes(&self) -> u32 {
        self.acked_bytes
    }

    /// Sender's view of the window.
    pub fn window(&self) -> &SlotWindow {
        &self.window
    }

    /// Whether `seq` is the outstanding SendFile request.
    pub fn awaits_handshake(&self, seq: u8) -> bool {
        self.phase == SenderPhase::Handshake { request_seq: seq }
    }

    /// Apply the receiver's answer. Returns the resulting status.
    pub fn on_handshake_ack(&mut self, ack: &SendFileAck) -> TransferStatus {
        if ack.status != TransferStatus::Ok {
            self.phase = SenderPhase::Done(TransferStatus::Aborted);
            return TransferStatus::Aborted;
        }
        self.params = TransferParams::new(ack.mtu, ack.dt_min, ack.dt_max).sanitized();
        self.pacer = Pacer::new(&self.params, self.ddt);
        self.session = ack.session;
        if self.file_len == 0 {
            self.phase = SenderPhase::Done(TransferStatus::Finished);
            TransferStatus::Finished
        } else {
            self.phase = SenderPhase::Running;
            TransferStatus::Ok
        }
    }

    /// End the transfer with `status`.
    pub fn finish(&mut self, status: TransferStatus) {
        self.phase = SenderPhase::Done(status);
        if status == TransferStatus::Finished {
            self.acked_bytes = self.file_len;
        }
    }

    /// First unsent slot of the window that lies inside the file.
    pub fn next_chunk(&self) -> Option<ChunkPlan> {
        let index = self.window.first_unset()?;
        let slot = self.window.base().checked_add(index)?;
        let mtu = u64::from(self.params.mtu);
        let offset = u64::from(slot) * mtu;
        if offset >= u64::from(self.file_len) {
            return None;
        }
        let len = (u64::from(self.file_len) - offset).min(mtu);
        Some(ChunkPlan {
            slot,
            offset: offset as u32,
            len: len as usize,
        })
    }

    /// Record that `slot` went out.
    pub fn mark_sent(&mut self, slot: u32) {
        self.window.set(slot);
    }

    /// Count a wakeup that found nothing to send. Returns true once the
    /// receiver stayed silent for [`SENDER_IDLE_LIMIT`] such wakeups.
    pub fn note_idle(&mut self) -> bool {
        self.idle_ticks += 1;
        self.idle_ticks >= SENDER_IDLE_LIMIT
    }

    /// Whether every byte was reported stored.
    pub fn all_acked(&self) -> bool {
        self.acked_bytes >= self.file_len
    }

    /// Apply a receiver status report and build the reply.
    ///
    /// Returns the reply and, when this report ended the transfer, the final
    /// status.
    pub fn on_status_report(
        &mut self,
        report: &StatusReport,
    ) -> (StatusAck, Option<TransferStatus>) {
        let mut ended = None;
        self.idle_ticks = 0;
        let status = match self.phase {
            SenderPhase::Running => match report.status {
                TransferStatus::Ok => TransferStatus::Ok,
                status => {
                    self.finish(status);
                    ended = Some(status);
                    status
                }
            },
            SenderPhase::Done(status) => status,
            SenderPhase::Handshake { .. } => TransferStatus::Aborted,
        };

        let current = SlotWindow::from_parts(report.base, report.mask);
        let newly = current.newly_acked_since(&self.reported);
        let bytes = u64::from(newly) * u64::from(self.params.mtu);
        self.acked_bytes = (u64::from(self.acked_bytes) + bytes).min(u64::from(self.file_len)) as u32;
        self.pacer.adjust(newly);

        // Older reports (a retransmitted status) must not roll the window back.
        let previous = self.reported;
        if current.base() > previous.base() {
            self.reported = current;
        } else if current.base() == previous.base() {
            self.reported = SlotWindow::from_parts(current.base(), current.mask() | previous.mask());
        }
        self.window = self.reported;

        let reply = StatusAck {
            status,
            dt: self.pacer.dt(),
        };
        (reply, ended)
    }
}
