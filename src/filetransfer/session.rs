//! File-transfer driver.
//!
//! [`FileTransfer`] is the [`LinkHandler`] of a link engine. It runs at most
//! one transfer at a time, as sender or as receiver:
//!
//! ```text
//! sender                                   receiver
//!   | ---- SendFile (sync) ----------------> |  negotiate, accept_file
//!   | <--- ack: status, params, session ---- |
//!   | ---- DataChunk (unsync) every dt ----> |  write, slide window
//!   | <--- Status (sync) every 16 chunks --- |
//!   | ---- ack: status, dt ----------------> |
//! ```

use tracing::{debug, info, trace, warn};

use super::config::TransferConfig;
use super::message::{
    Command, DataChunk, SendFileAck, SendFileRequest, StatusAck, StatusReport, TransferStatus,
};
use super::negotiation::TransferParams;
use super::receiver::ReceiverState;
use super::sender::{SenderPhase, SenderState};
use super::session_id::SessionIdGenerator;
use super::storage::FileStorage;
use crate::core::constants::{MAX_PAYLOAD_LEN, STATUS_PERIOD_FACTOR};
use crate::core::{LinkError, LinkHandler, LinkSend, Tick, TransferError};

/// Host hooks of a file-transfer endpoint.
pub trait TransferEvents {
    /// Call [`FileTransfer::on_wakeup`] in `delta` ticks, replacing any
    /// pending wakeup.
    fn request_wakeup(&mut self, delta: Tick);

    /// Drop the pending wakeup.
    fn cancel_wakeup(&mut self);

    /// The transfer finished or was aborted.
    fn on_status(&mut self, status: TransferStatus);
}

/// Active or last transfer of an endpoint.
#[derive(Debug, Clone)]
pub enum Session {
    /// This endpoint sends.
    Sender(SenderState),
    /// This endpoint receives.
    Receiver(ReceiverState),
}

impl Session {
    /// Whether the transfer has not ended.
    pub fn is_active(&self) -> bool {
        match self {
            Session::Sender(tx) => tx.is_active(),
            Session::Receiver(rx) => rx.is_running(),
        }
    }
}

/// Bytes moved so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes stored by the receiver (as last reported, on the sender).
    pub transferred: u32,
    /// File length.
    pub total: u32,
    /// Transfer status, [`TransferStatus::Ok`] while running.
    pub status: TransferStatus,
}

impl Progress {
    /// Whether every byte arrived.
    pub fn is_complete(&self) -> bool {
        self.transferred >= self.total
    }

    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            f64::from(self.transferred) / f64::from(self.total)
        }
    }
}

/// File-transfer endpoint.
#[derive(Debug)]
pub struct FileTransfer<S, E> {
    config: TransferConfig,
    storage: S,
    events: E,
    ids: SessionIdGenerator,
    session: Option<Session>,
    scratch: Vec<u8>,
}

impl<S: FileStorage, E: TransferEvents> FileTransfer<S, E> {
    /// Create an idle endpoint.
    pub fn new(config: TransferConfig, storage: S, events: E) -> Self {
        Self {
            config,
            storage,
            events,
            ids: SessionIdGenerator::new(),
            session: None,
            scratch: Vec::with_capacity(MAX_PAYLOAD_LEN),
        }
    }

    /// Use `ids` for the session ids this endpoint hands out.
    pub fn with_session_ids(mut self, ids: SessionIdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Local preferences.
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Storage collaborator.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Storage collaborator, mutably.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Host hooks.
    pub fn events(&self) -> &E {
        &self.events
    }

    /// Host hooks, mutably.
    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    /// Active or last transfer.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Whether a transfer is in progress.
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_active)
    }

    /// Progress of the active or last transfer.
    pub fn progress(&self) -> Option<Progress> {
        self.session.as_ref().map(|session| match session {
            Session::Sender(tx) => Progress {
                transferred: tx.acked_bytes(),
                total: tx.file_len(),
                status: match tx.phase() {
                    SenderPhase::Done(status) => status,
                    _ => TransferStatus::Ok,
                },
            },
            Session::Receiver(rx) => Progress {
                transferred: rx.received(),
                total: rx.file_len(),
                status: rx.status(),
            },
        })
    }

    /// Offer a file of `file_len` bytes to the peer.
    ///
    /// Returns the link sequence number of the SendFile frame.
    pub fn send_file(
        &mut self,
        link: &mut dyn LinkSend,
        file_len: u32,
        name: &str,
    ) -> Result<u8, TransferError> {
        if self.is_active() {
            return Err(TransferError::SessionActive);
        }
        let request = SendFileRequest {
            file_len,
            mtu: self.config.mtu,
            dt_min: self.config.dt_min,
            dt_max: self.config.dt_max,
            name: name.as_bytes().to_vec(),
        };
        let seq = link.send(true, &request.to_bytes()?)?;
        info!(file_len, name, seq, "transfer: offering file");
        self.session = Some(Session::Sender(SenderState::new(
            file_len,
            self.config.params(),
            self.config.ddt,
            seq,
        )));
        Ok(seq)
    }

    /// Handle an elapsed wakeup requested through [`TransferEvents`].
    pub fn on_wakeup(&mut self, link: &mut dyn LinkSend) {
        match self.session {
            Some(Session::Sender(_)) => self.sender_tick(link),
            Some(Session::Receiver(_)) => self.receiver_tick(link),
            None => {}
        }
    }

    fn end(&mut self, status: TransferStatus) {
        info!(?status, "transfer: ended");
        self.events.on_status(status);
    }

    // =========================================================================
    // SENDER
    // =========================================================================

    fn sender_tick(&mut self, link: &mut dyn LinkSend) {
        let Some(Session::Sender(tx)) = &mut self.session else {
            return;
        };
        if !tx.is_running() {
            return;
        }
        if tx.next_chunk().is_some() {
            self.send_next_chunk(link);
        } else if tx.note_idle() {
            warn!(
                base = tx.window().base(),
                acked = tx.acked_bytes(),
                "transfer: receiver silent, aborting"
            );
            tx.finish(TransferStatus::Aborted);
            self.end(TransferStatus::Aborted);
            return;
        }
        if let Some(Session::Sender(tx)) = &self.session {
            if tx.is_running() && !tx.all_acked() {
                self.events.request_wakeup(Tick::from(tx.dt()));
            }
        }
    }

    fn send_next_chunk(&mut self, link: &mut dyn LinkSend) {
        let Some(Session::Sender(tx)) = &mut self.session else {
            return;
        };
        let Some(plan) = tx.next_chunk() else {
            trace!(base = tx.window().base(), "transfer: nothing to send");
            return;
        };

        let mut data = vec![0u8; plan.len];
        if let Err(err) = self.storage.read(plan.offset, &mut data) {
            warn!(offset = plan.offset, %err, "transfer: read failed, aborting");
            tx.finish(TransferStatus::Aborted);
            self.end(TransferStatus::Aborted);
            return;
        }

        self.scratch.clear();
        DataChunk {
            session: tx.session(),
            slot: plan.slot,
            data: &data,
        }
        .encode_into(&mut self.scratch);
        match link.send(false, &self.scratch) {
            Ok(_) => {
                trace!(slot = plan.slot, len = plan.len, "transfer: chunk sent");
                tx.mark_sent(plan.slot);
            }
            Err(err) => warn!(slot = plan.slot, %err, "transfer: chunk not sent"),
        }
    }

    fn on_handshake_ack(&mut self, seq: u8, payload: &[u8]) {
        let Some(Session::Sender(tx)) = &mut self.session else {
            return;
        };
        if !tx.awaits_handshake(seq) {
            trace!(seq, "transfer: stale handshake ack");
            return;
        }
        let ack = match SendFileAck::from_bytes(payload) {
            Ok(ack) => ack,
            Err(err) => {
                warn!(%err, "transfer: malformed handshake ack");
                return;
            }
        };
        match tx.on_handshake_ack(&ack) {
            TransferStatus::Ok => {
                let params = *tx.params();
                info!(
                    session = ack.session,
                    mtu = params.mtu,
                    dt_min = params.dt_min,
                    dt_max = params.dt_max,
                    "transfer: accepted"
                );
                self.events.request_wakeup(Tick::from(tx.dt()));
            }
            status => self.end(status),
        }
    }

    fn on_status_report(&mut self, link: &mut dyn LinkSend, payload: &[u8]) {
        let report = match StatusReport::from_bytes(payload) {
            Ok(report) => report,
            Err(err) => {
                debug!(%err, "transfer: malformed status");
                return;
            }
        };
        let Some(Session::Sender(tx)) = &mut self.session else {
            trace!("transfer: status without sender session");
            return;
        };
        if matches!(tx.phase(), SenderPhase::Handshake { .. }) || report.session != tx.session() {
            debug!(session = report.session, "transfer: status for other session");
            return;
        }

        let (reply, ended) = tx.on_status_report(&report);
        debug!(
            base = report.base,
            mask = format_args!("{:08x}", report.mask),
            acked = tx.acked_bytes(),
            dt = reply.dt,
            "transfer: status"
        );
        if let Err(err) = link.reply_ack(&reply.to_bytes()) {
            warn!(%err, "transfer: status reply failed");
        }
        if let Some(status) = ended {
            self.end(status);
        }
    }

    // =========================================================================
    // RECEIVER
    // =========================================================================

    fn receiver_tick(&mut self, link: &mut dyn LinkSend) {
        let Some(Session::Receiver(rx)) = &self.session else {
            return;
        };
        if rx.is_running() && !rx.is_complete() {
            let period = rx.status_period();
            self.send_status(link);
            self.events.request_wakeup(period);
        }
    }

    fn send_status(&mut self, link: &mut dyn LinkSend) {
        let Some(Session::Receiver(rx)) = &mut self.session else {
            return;
        };
        let report = rx.report();
        match link.send(true, &report.to_bytes()) {
            Ok(seq) => {
                trace!(seq, base = report.base, status = ?report.status, "transfer: status sent");
                rx.status_sent(seq);
            }
            Err(LinkError::Busy) if !rx.is_running() => {
                debug!("transfer: link busy, final status deferred");
                rx.defer_final();
            }
            Err(err) => debug!(%err, "transfer: status not sent"),
        }
    }

    fn on_send_file(&mut self, link: &mut dyn LinkSend, payload: &[u8]) {
        let request = match SendFileRequest::from_bytes(payload) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "transfer: malformed send file request");
                return;
            }
        };
        let remote = TransferParams::new(request.mtu, request.dt_min, request.dt_max);
        let params = self.config.params().negotiate(&remote);
        let name = request.name_lossy();

        if self.is_active() {
            warn!(name = %name, "transfer: busy, refusing offer");
            self.reply_handshake(link, TransferStatus::Aborted, &params, 0);
            return;
        }

        let accepted = match self.storage.accept(request.file_len, &name) {
            Ok(()) => true,
            Err(err) => {
                info!(name = %name, file_len = request.file_len, %err, "transfer: offer rejected");
                false
            }
        };
        let session = self.ids.next_id();
        let status = if accepted { TransferStatus::Ok } else { TransferStatus::Aborted };
        self.reply_handshake(link, status, &params, session);
        if !accepted {
            return;
        }

        info!(
            name = %name,
            file_len = request.file_len,
            session,
            mtu = params.mtu,
            "transfer: receiving"
        );
        let mut rx = ReceiverState::new(session, request.file_len, params);
        if rx.is_complete() {
            rx.finish(TransferStatus::Finished);
            self.session = Some(Session::Receiver(rx));
            self.end(TransferStatus::Finished);
            return;
        }
        self.session = Some(Session::Receiver(rx));
        // No pacing interval is known before the first status ack, so the
        // first period is based on dt_max. Later ones use the acked dt.
        self.events
            .request_wakeup(Tick::from(params.dt_max) * Tick::from(STATUS_PERIOD_FACTOR));
    }

    fn reply_handshake(
        &mut self,
        link: &mut dyn LinkSend,
        status: TransferStatus,
        params: &TransferParams,
        session: u16,
    ) {
        let ack = SendFileAck {
            status,
            mtu: params.mtu,
            dt_min: params.dt_min,
            dt_max: params.dt_max,
            session,
        };
        if let Err(err) = link.reply_ack(&ack.to_bytes()) {
            warn!(%err, "transfer: handshake reply failed");
        }
    }

    fn on_data_chunk(&mut self, link: &mut dyn LinkSend, payload: &[u8]) {
        let chunk = match DataChunk::from_bytes(payload) {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!(%err, "transfer: malformed chunk");
                return;
            }
        };
        let Some(Session::Receiver(rx)) = &mut self.session else {
            return;
        };
        if chunk.session != rx.session() {
            trace!(session = chunk.session, "transfer: chunk for other session");
            return;
        }
        if !rx.is_running() {
            return;
        }

        let status_due = rx.note_chunk();
        match rx.check_chunk(chunk.slot, chunk.data.len()) {
            Ok(offset) => {
                if let Err(err) = self.storage.write(offset, chunk.data) {
                    warn!(slot = chunk.slot, %err, "transfer: write failed, aborting");
                    rx.finish(TransferStatus::Aborted);
                    self.events.cancel_wakeup();
                    self.send_status(link);
                    self.end(TransferStatus::Aborted);
                    return;
                }
                rx.commit_chunk(chunk.slot, chunk.data.len());
                trace!(
                    slot = chunk.slot,
                    base = rx.window().base(),
                    received = rx.received(),
                    "transfer: chunk stored"
                );
            }
            Err(reason) => {
                trace!(slot = chunk.slot, ?reason, "transfer: chunk dropped");
            }
        }

        self.events.cancel_wakeup();
        if rx.is_complete() {
            rx.finish(TransferStatus::Finished);
            self.send_status(link);
            self.end(TransferStatus::Finished);
        } else {
            let period = rx.status_period();
            if status_due {
                self.send_status(link);
            }
            self.events.request_wakeup(period);
        }
    }

    fn on_status_ack(&mut self, link: &mut dyn LinkSend, seq: u8, payload: &[u8]) {
        let Some(Session::Receiver(rx)) = &mut self.session else {
            return;
        };
        if !rx.is_status_ack(seq) {
            trace!(seq, "transfer: stale status ack");
            return;
        }
        let ack = match StatusAck::from_bytes(payload) {
            Ok(ack) => ack,
            Err(err) => {
                debug!(%err, "transfer: malformed status ack");
                return;
            }
        };
        if !rx.is_running() {
            if rx.final_pending() {
                self.send_status(link);
            }
            return;
        }
        rx.set_dt(ack.dt);
        if ack.status != TransferStatus::Ok {
            rx.finish(ack.status);
            self.events.cancel_wakeup();
            self.end(ack.status);
        }
    }
}

impl<S: FileStorage, E: TransferEvents> LinkHandler for FileTransfer<S, E> {
    fn on_packet(&mut self, link: &mut dyn LinkSend, seq: u8, payload: &[u8], requires_ack: bool) {
        match (Command::of(payload), requires_ack) {
            (Some(Command::SendFile), true) => self.on_send_file(link, payload),
            (Some(Command::DataChunk), false) => self.on_data_chunk(link, payload),
            (Some(Command::Status), true) => self.on_status_report(link, payload),
            _ => trace!(seq, len = payload.len(), requires_ack, "transfer: not a transfer frame"),
        }
    }

    fn on_packet_acked(&mut self, link: &mut dyn LinkSend, seq: u8, payload: &[u8]) {
        match Command::of(payload) {
            Some(Command::SendFile) => self.on_handshake_ack(seq, payload),
            Some(Command::Status) => self.on_status_ack(link, seq, payload),
            _ => trace!(seq, "transfer: ack without transfer payload"),
        }
    }

    fn on_timeout(&mut self, link: &mut dyn LinkSend, seq: u8, _payload: &[u8]) {
        match &mut self.session {
            Some(Session::Sender(tx)) if tx.awaits_handshake(seq) => {
                warn!(seq, "transfer: no answer to offer");
                tx.finish(TransferStatus::Aborted);
                self.end(TransferStatus::Aborted);
            }
            Some(Session::Receiver(rx)) if rx.is_status_ack(seq) => {
                debug!(seq, "transfer: status not acknowledged");
                if !rx.is_running() && rx.final_pending() {
                    self.send_status(link);
                }
            }
            _ => {}
        }
    }
}
