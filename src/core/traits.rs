//! Host capabilities and delivery callbacks.
//!
//! The link engine never touches hardware itself. The host hands it a
//! [`LinkPlatform`] at construction time and a [`LinkHandler`] with every
//! call that may deliver frames.

use super::error::LinkError;

/// Monotonic tick count supplied by the host clock.
pub type Tick = u64;

/// Clock, single-slot wakeup scheduler and byte egress of one link.
///
/// # Requirements
///
/// - At most one wakeup is pending at any time. `request_wakeup` is only
///   called after a pending wakeup has been cancelled or has fired.
/// - When a requested wakeup elapses the host MUST call
///   [`LinkEngine::on_timer_fire`](crate::link::LinkEngine::on_timer_fire).
pub trait LinkPlatform {
    /// Schedule one call to `on_timer_fire` in `delta` ticks.
    fn request_wakeup(&mut self, delta: Tick);

    /// Drop the pending wakeup.
    fn cancel_wakeup(&mut self);

    /// Current time.
    fn now(&self) -> Tick;

    /// Write raw bytes to the channel. Each call carries one whole frame.
    fn transmit(&mut self, bytes: &[u8]);
}

/// Send primitives available to upper layers.
///
/// Implemented by the engine itself and by the responder handed to
/// [`LinkHandler`] callbacks, so a handler may answer from within a callback.
pub trait LinkSend {
    /// Send a frame. Returns the sequence number for synchronized frames,
    /// 0 otherwise.
    fn send(&mut self, requires_ack: bool, payload: &[u8]) -> Result<u8, LinkError>;

    /// Acknowledge the synchronized frame being handled, piggybacking `payload`.
    fn reply_ack(&mut self, payload: &[u8]) -> Result<(), LinkError>;

    /// Whether a synchronized frame is waiting for its ack.
    fn is_awaiting_ack(&self) -> bool;
}

/// Delivery callbacks, invoked synchronously while bytes are fed or a timer
/// fires.
pub trait LinkHandler {
    /// A data frame arrived. If `requires_ack` and the handler does not call
    /// [`LinkSend::reply_ack`], an empty ack is sent once this returns.
    fn on_packet(&mut self, link: &mut dyn LinkSend, seq: u8, payload: &[u8], requires_ack: bool);

    /// The outstanding synchronized frame was acknowledged.
    fn on_packet_acked(&mut self, link: &mut dyn LinkSend, seq: u8, payload: &[u8]);

    /// The outstanding synchronized frame exhausted its retries.
    fn on_timeout(&mut self, link: &mut dyn LinkSend, seq: u8, payload: &[u8]);

    /// A byte arrived outside of any frame.
    fn on_nonprotocol_byte(&mut self, byte: u8) {
        let _ = byte;
    }
}
