//! Events fed into the broker's coordinating loop by reader tasks

use bytes::Bytes;

use mt_protocol::{ChannelId, Message};

use crate::registry::MuxId;

/// Events from per-socket reader tasks
#[derive(Debug)]
pub enum BrokerEvent {
    /// Raw bytes read from an assigned client socket
    ClientData {
        /// Channel the client socket belongs to
        id: ChannelId,
        /// Bytes read in one chunk
        bytes: Bytes,
    },

    /// Client socket reached EOF or errored
    ClientClosed {
        /// Channel the client socket belonged to
        id: ChannelId,
    },

    /// A complete frame arrived on a mux connection
    MuxMessage {
        /// Mux the frame arrived on
        mux: MuxId,
        /// The decoded message
        message: Message,
    },

    /// Mux connection reached EOF, errored, or produced a protocol
    /// violation; it is unusable either way
    MuxClosed {
        /// The mux that failed
        mux: MuxId,
    },
}
