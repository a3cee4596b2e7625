//! File transfer over a link engine.
//!
//! A sender offers a file with a synchronized SendFile frame. The receiver
//! negotiates chunk size and pacing, asks its [`FileStorage`] whether to
//! accept, and answers with a session id. Data then flows as unsynchronized
//! chunks paced by the sender, while the receiver reports its 32-slot window
//! with synchronized Status frames so the sender retransmits exactly the gaps.

mod config;
mod message;
mod negotiation;
mod pacing;
mod receiver;
mod sender;
mod session;
mod session_id;
mod storage;
mod window;

pub use config::TransferConfig;
pub use message::{
    Command, DataChunk, SendFileAck, SendFileRequest, StatusAck, StatusReport, TransferStatus,
};
pub use negotiation::TransferParams;
pub use pacing::Pacer;
pub use receiver::{ChunkReject, ReceiverState};
pub use sender::{ChunkPlan, SenderPhase, SenderState};
pub use session::{FileTransfer, Progress, Session, TransferEvents};
pub use session_id::SessionIdGenerator;
pub use storage::{FileStorage, MemoryStorage};
pub use window::SlotWindow;
