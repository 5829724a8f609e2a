//! Protocol error types

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Header carried a version other than the supported one. The
    /// stream is considered corrupt and must be closed.
    #[error("Unsupported protocol version: {0}")]
    VersionMismatch(u32),

    /// Header carried an event type outside the known set
    #[error("Unknown event type: {0}")]
    UnknownEventType(u32),

    /// Peer closed the stream before a complete frame was read
    #[error("Stream closed mid-frame")]
    StreamClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
