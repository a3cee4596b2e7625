//! # Microlink
//!
//! A framed, acknowledged link over a raw byte channel, and a sliding-window
//! file transfer on top of it. Built for serial lines and radios driven from
//! a single-threaded or interrupt-driven loop: nothing blocks, nothing
//! spawns, and the host supplies the clock, one wakeup slot and byte egress.
//!
//! - **Link**: CRC-16 frames with a variable-length header, one synchronized
//!   frame in flight, retransmission on timeout or NACK, duplicate
//!   suppression through a cached ack.
//! - **File transfer**: parameter negotiation, 32-slot selective repeat,
//!   additive pacing driven by the receiver's window reports.
//!
//! ## Feature Flags
//!
//! - `filetransfer` (default): File-transfer layer
//!
//! ## Modules
//!
//! - [`core`]: Host traits, constants, and error types (always included)
//! - [`link`]: Frame codec and link engine (always included)
//! - [`filetransfer`]: File-transfer layer (requires `filetransfer` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use microlink::prelude::*;
//!
//! #[derive(Default)]
//! struct Uart {
//!     out: Vec<u8>,
//! }
//!
//! impl LinkPlatform for Uart {
//!     fn request_wakeup(&mut self, _delta: Tick) {}
//!     fn cancel_wakeup(&mut self) {}
//!     fn now(&self) -> Tick {
//!         0
//!     }
//!     fn transmit(&mut self, bytes: &[u8]) {
//!         self.out.extend_from_slice(bytes);
//!     }
//! }
//!
//! let mut link = LinkEngine::new(Uart::default(), LinkConfig::default());
//! let seq = link.send(true, b"hi").unwrap();
//! assert_eq!(seq, 1);
//! assert_eq!(link.platform().out, [0xFD, 0x45, 0x01, b'h', b'i', 0x1E, 0x25]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Link layer (always included)
pub mod link;

// File transfer (feature-gated)
#[cfg(feature = "filetransfer")]
#[cfg_attr(docsrs, doc(cfg(feature = "filetransfer")))]
pub mod filetransfer;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    // Link layer
    pub use crate::link::{Frame, FrameKind, LinkConfig, LinkEngine, RxState};

    // File transfer (when enabled)
    #[cfg(feature = "filetransfer")]
    pub use crate::filetransfer::{
        FileStorage, FileTransfer, MemoryStorage, Progress, SessionIdGenerator, TransferConfig,
        TransferEvents, TransferStatus,
    };
}

// Re-export commonly used items at crate root
pub use crate::core::{LinkError, LinkHandler, LinkPlatform, LinkSend, NackCode, Tick};
pub use crate::link::{Frame, FrameKind, LinkConfig, LinkEngine};

#[cfg(feature = "filetransfer")]
pub use crate::filetransfer::{FileTransfer, TransferConfig, TransferStatus};
