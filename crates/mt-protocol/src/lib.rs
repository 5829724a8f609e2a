//! mt-protocol: Wire protocol for muxtun channel multiplexing
//!
//! This crate defines the binary framing used between the broker and
//! agents over mux connections. Every frame is a fixed 16-byte header
//! followed by an opaque payload; the header carries the protocol
//! version, the channel id the payload belongs to, and the event type.

pub mod blocking;
pub mod channel;
pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use channel::ChannelId;
pub use codec::FrameCodec;
pub use error::ProtocolError;
pub use frame::{FrameHeader, HEADER_SIZE, MAX_READ_CHUNK};
pub use message::{EventType, Message, PROTOCOL_VERSION};
