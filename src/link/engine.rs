//! The link engine: framing, acknowledgment and retransmission for one peer.
//!
//! One synchronized frame may be outstanding at a time. It is retransmitted
//! on the ack deadline or on a BadCrc/RxTimeout NACK until it is acked or the
//! retry limit is exceeded. Received synchronized frames are acked once and
//! duplicates are answered from the cached ack without reaching the handler.

use std::mem;

use tracing::{debug, trace, warn};

use super::config::LinkConfig;
use super::decoder::{Decoded, FrameDecoder, RxState};
use super::frame::{FrameKind, encode_into};
use super::timer::{TimerMux, TimerSlot};
use crate::core::constants::{MAX_FRAME_LEN, MAX_PAYLOAD_LEN, SEQ_FIRST, SEQ_MAX};
use crate::core::{LinkError, LinkHandler, LinkPlatform, LinkSend, NackCode, Tick};

/// Transmit side of the engine.
///
/// Split from the decoder so handler callbacks can borrow the received
/// payload while sending through this half.
#[derive(Debug)]
struct Outbound<P> {
    platform: P,
    config: LinkConfig,
    timers: TimerMux,
    tx_seq: u8,
    await_ack: bool,
    retry_count: u32,
    /// Payload of the outstanding synchronized frame.
    pending: Vec<u8>,
    /// Sequence of the last ack sent, 0 before any.
    ack_seq: u8,
    ack_payload: Vec<u8>,
    /// Inbound synchronized frame still waiting for its ack.
    reply_to: Option<u8>,
    wire: Vec<u8>,
}

impl<P: LinkPlatform> Outbound<P> {
    fn new(platform: P, config: LinkConfig) -> Self {
        Self {
            platform,
            config,
            timers: TimerMux::new(),
            tx_seq: SEQ_FIRST,
            await_ack: false,
            retry_count: 0,
            pending: Vec::with_capacity(MAX_PAYLOAD_LEN),
            ack_seq: 0,
            ack_payload: Vec::with_capacity(MAX_PAYLOAD_LEN),
            reply_to: None,
            wire: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    fn emit(platform: &mut P, wire: &mut Vec<u8>, kind: FrameKind, seq: u8, payload: &[u8]) {
        wire.clear();
        match encode_into(kind, seq, payload, wire) {
            Ok(()) => platform.transmit(wire),
            Err(err) => warn!(?kind, seq, %err, "link: frame not sent"),
        }
    }

    fn advance_seq(&mut self) {
        self.tx_seq = if self.tx_seq >= SEQ_MAX { SEQ_FIRST } else { self.tx_seq + 1 };
    }

    fn arm(&mut self, slot: TimerSlot, delta: Tick) {
        self.timers.arm(&mut self.platform, slot, delta);
    }

    fn cancel(&mut self, slot: TimerSlot) {
        self.timers.cancel(&mut self.platform, slot);
    }

    fn retransmit(&mut self) {
        Self::emit(
            &mut self.platform,
            &mut self.wire,
            FrameKind::Sync,
            self.tx_seq,
            &self.pending,
        );
    }

    fn send_nack(&mut self, code: NackCode, seq: u8) {
        debug!(seq, ?code, "link: tx nack");
        Self::emit(
            &mut self.platform,
            &mut self.wire,
            FrameKind::Nack,
            seq,
            &[code.as_byte()],
        );
    }

    fn send_ack(&mut self, seq: u8, payload: &[u8]) {
        self.ack_seq = seq;
        self.ack_payload.clear();
        self.ack_payload.extend_from_slice(payload);
        self.resend_ack();
    }

    fn resend_ack(&mut self) {
        Self::emit(
            &mut self.platform,
            &mut self.wire,
            FrameKind::Ack,
            self.ack_seq,
            &self.ack_payload,
        );
    }

    fn reset(&mut self) {
        self.timers.cancel_all(&mut self.platform);
        self.tx_seq = SEQ_FIRST;
        self.await_ack = false;
        self.retry_count = 0;
        self.pending.clear();
        self.ack_seq = 0;
        self.ack_payload.clear();
        self.reply_to = None;
    }
}

impl<P: LinkPlatform> LinkSend for Outbound<P> {
    fn send(&mut self, requires_ack: bool, payload: &[u8]) -> Result<u8, LinkError> {
        if requires_ack && self.await_ack {
            debug!(seq = self.tx_seq, "link: sync send while busy");
            return Err(LinkError::Busy);
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            debug!(len = payload.len(), "link: payload too long");
            return Err(LinkError::TooLong { len: payload.len() });
        }

        if !requires_ack {
            trace!(len = payload.len(), "link: tx unsync");
            Self::emit(&mut self.platform, &mut self.wire, FrameKind::NotSync, 0, payload);
            return Ok(0);
        }

        self.pending.clear();
        self.pending.extend_from_slice(payload);
        trace!(seq = self.tx_seq, len = payload.len(), "link: tx sync");
        self.retransmit();
        self.retry_count = 0;
        self.await_ack = true;
        let delay = self.config.retry_delay_for(0);
        self.arm(TimerSlot::Ack, delay);
        Ok(self.tx_seq)
    }

    fn reply_ack(&mut self, payload: &[u8]) -> Result<(), LinkError> {
        let Some(seq) = self.reply_to else {
            debug!("link: reply ack outside of sync frame");
            return Err(LinkError::WrongState);
        };
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(LinkError::TooLong { len: payload.len() });
        }
        self.reply_to = None;
        trace!(seq, len = payload.len(), "link: tx ack reply");
        self.send_ack(seq, payload);
        Ok(())
    }

    fn is_awaiting_ack(&self) -> bool {
        self.await_ack
    }
}

/// Link engine for one peer.
///
/// Owns the host [`LinkPlatform`]. Handlers are passed to every call that
/// may deliver frames.
#[derive(Debug)]
pub struct LinkEngine<P> {
    decoder: FrameDecoder,
    out: Outbound<P>,
}

impl<P: LinkPlatform> LinkEngine<P> {
    /// Create an engine. The sequence counter starts at 1.
    pub fn new(platform: P, config: LinkConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            out: Outbound::new(platform, config),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &LinkConfig {
        &self.out.config
    }

    /// Host platform.
    pub fn platform(&self) -> &P {
        &self.out.platform
    }

    /// Host platform, mutably.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.out.platform
    }

    /// Sequence number the next (or outstanding) synchronized frame uses.
    pub fn tx_seq(&self) -> u8 {
        self.out.tx_seq
    }

    /// Retransmissions of the outstanding frame so far.
    pub fn retry_count(&self) -> u32 {
        self.out.retry_count
    }

    /// Decoder state.
    pub fn rx_state(&self) -> RxState {
        self.decoder.state()
    }

    /// Re-initialize: drop partial input, the outstanding frame and the ack
    /// cache, cancel timers, restart sequence numbers at 1.
    pub fn reset(&mut self) {
        debug!("link: reset");
        self.decoder.reset();
        self.out.reset();
    }

    /// Feed one received byte.
    pub fn on_byte<H: LinkHandler + ?Sized>(&mut self, byte: u8, handler: &mut H) {
        match self.decoder.push(byte) {
            Decoded::Pending => {}
            Decoded::NonProtocol(byte) => handler.on_nonprotocol_byte(byte),
            Decoded::FrameStart { resynced } => {
                if resynced && self.out.config.nack_garbage {
                    self.out.send_nack(NackCode::NotPreamble, 0);
                }
                let timeout = self.out.config.rx_timeout;
                self.out.arm(TimerSlot::Rx, timeout);
            }
            Decoded::BadCrc { seq } => {
                self.out.cancel(TimerSlot::Rx);
                warn!(seq, "link: rx bad crc");
                self.out.send_nack(NackCode::BadCrc, seq);
            }
            Decoded::Complete => {
                self.out.cancel(TimerSlot::Rx);
                self.dispatch(handler);
            }
        }
    }

    /// Feed a buffer of received bytes.
    pub fn on_bytes<H: LinkHandler + ?Sized>(&mut self, bytes: &[u8], handler: &mut H) {
        for &byte in bytes {
            self.on_byte(byte, handler);
        }
    }

    /// Handle an elapsed host wakeup.
    pub fn on_timer_fire<H: LinkHandler + ?Sized>(&mut self, handler: &mut H) {
        let now = self.out.platform.now();
        let expired = self.out.timers.fire(now);
        if expired.rx {
            self.on_rx_timeout();
        }
        if expired.ack {
            self.on_ack_timeout(handler);
        }
        self.out.timers.resume(&mut self.out.platform);
    }

    fn on_rx_timeout(&mut self) {
        let seq = self.decoder.seq();
        warn!(seq, state = ?self.decoder.state(), "link: rx timeout");
        self.out.send_nack(NackCode::RxTimeout, seq);
        self.decoder.reset();
    }

    fn on_ack_timeout<H: LinkHandler + ?Sized>(&mut self, handler: &mut H) {
        let out = &mut self.out;
        if !out.await_ack {
            return;
        }
        out.retry_count += 1;
        if out.retry_count > out.config.retries {
            let seq = out.tx_seq;
            warn!(seq, retries = out.config.retries, "link: no ack, giving up");
            out.advance_seq();
            out.retry_count = 0;
            out.await_ack = false;
            let payload = mem::take(&mut out.pending);
            handler.on_timeout(out, seq, &payload);
        } else {
            debug!(seq = out.tx_seq, attempt = out.retry_count, "link: no ack, retransmit");
            out.retransmit();
            let delay = out.config.retry_delay_for(out.retry_count);
            out.arm(TimerSlot::Ack, delay);
        }
    }

    fn dispatch<H: LinkHandler + ?Sized>(&mut self, handler: &mut H) {
        let frame = self.decoder.frame();
        let out = &mut self.out;
        match frame.kind {
            FrameKind::Ack => {
                if out.await_ack && frame.seq == out.tx_seq {
                    trace!(seq = frame.seq, len = frame.payload.len(), "link: rx ack");
                    out.cancel(TimerSlot::Ack);
                    out.await_ack = false;
                    out.advance_seq();
                    handler.on_packet_acked(out, frame.seq, frame.payload);
                } else {
                    trace!(seq = frame.seq, "link: rx ack for unknown seq");
                }
            }
            FrameKind::Nack => {
                let Some(&code) = frame.payload.first() else {
                    debug!(seq = frame.seq, "link: rx empty nack");
                    return;
                };
                let code = NackCode::from_byte(code);
                if !(out.await_ack && frame.seq == out.tx_seq) {
                    debug!(seq = frame.seq, ?code, "link: rx nack for unknown seq");
                } else if code.triggers_retransmit() {
                    debug!(seq = frame.seq, ?code, "link: rx nack, retransmit now");
                    out.cancel(TimerSlot::Ack);
                    out.retransmit();
                    out.retry_count = 0;
                    let delay = out.config.retry_delay_for(0);
                    out.arm(TimerSlot::Ack, delay);
                } else {
                    debug!(seq = frame.seq, ?code, "link: rx nack");
                }
            }
            FrameKind::NotSync | FrameKind::Sync => {
                let requires_ack = frame.kind == FrameKind::Sync;
                if requires_ack && frame.seq == out.ack_seq {
                    debug!(seq = frame.seq, "link: duplicate sync frame, re-ack");
                    out.resend_ack();
                    return;
                }
                trace!(seq = frame.seq, len = frame.payload.len(), requires_ack, "link: rx data");
                out.reply_to = requires_ack.then_some(frame.seq);
                handler.on_packet(out, frame.seq, frame.payload, requires_ack);
                if let Some(seq) = out.reply_to.take() {
                    trace!(seq, "link: tx auto ack");
                    out.send_ack(seq, &[]);
                }
            }
        }
    }
}

impl<P: LinkPlatform> LinkSend for LinkEngine<P> {
    fn send(&mut self, requires_ack: bool, payload: &[u8]) -> Result<u8, LinkError> {
        self.out.send(requires_ack, payload)
    }

    fn reply_ack(&mut self, payload: &[u8]) -> Result<(), LinkError> {
        self.out.reply_ack(payload)
    }

    fn is_awaiting_ack(&self) -> bool {
        self.out.await_ack
    }
}
