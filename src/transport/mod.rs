//! Length-prefixed tuple transport between pipeline elements.
//!
//! One TCP connection carries two tuple kinds bound for two destination
//! queues. The stream is a sequence of frames:
//!
//! ```text
//! data frame:  [len: u32 BE][len bytes of serialized tuple]
//! mode frame:  [u32::MAX   ][16 bytes: ASCII flag, NUL padded]
//! ```
//!
//! A mode frame changes how the receiver interprets every data frame that
//! follows it on the same connection, which lets an intermediary keep
//! receiving traffic for the old algorithm while transitional traffic for the
//! new one is parked in a separate queue, without a second handshake.
//!
//! # Design
//!
//! - **Pure protocol core**: [`protocol::transition`] maps `(mode, frame)` to
//!   `(mode, action)`; the receiver loop only reads, transitions and acts.
//! - **Thread per connection**: [`TupleReceiver`] runs a blocking loop on a
//!   dedicated OS thread. Closing the socket is the only way to stop it.
//! - **Best-effort sends**: [`TupleSender`] connects lazily and never retries.
//! - **Mode requests**: [`ModeRequest`] asks for a mode change that the next
//!   write through the sender applies, so routing never waits on a busy writer.

pub mod frame;
pub mod protocol;
pub mod receiver;
pub mod sender;

pub use frame::{read_frame, write_frame, Frame, ModeFlag, MODE_FLAG_WIDTH, MODE_FRAME_LENGTH};
pub use protocol::{transition, Destination, ReceiverAction, ReceiverMode, SerializerPair};
pub use receiver::{ReceiverHandle, ReceiverStats, TupleReceiver, TupleSink};
pub use sender::{ModeRequest, TupleSender};

use thiserror::Error;

/// Errors raised by frame codecs, senders and receivers.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection has been dropped")]
    ConnectionLost,

    #[error("Sender is disconnected from {0}")]
    Disconnected(String),

    #[error("Frame of {len} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Unknown mode flag: {0}")]
    UnknownModeFlag(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl TransportError {
    /// Whether a receiver loop must stop after this error.
    ///
    /// An unknown mode flag leaves the stream aligned on a frame boundary, so
    /// reading can go on; everything else means the byte stream is unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TransportError::UnknownModeFlag(_) | TransportError::Serialization(_)
        )
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
