//! Frame header encoding/decoding
//!
//! The frame format uses a 16-byte header of four big-endian u32 fields:
//! - version (must be 1)
//! - channel_id
//! - event_type
//! - payload_length
//!
//! followed by exactly `payload_length` raw bytes.

use bytes::{BufMut, BytesMut};

use crate::channel::ChannelId;
use crate::error::ProtocolError;
use crate::message::{EventType, Message, PROTOCOL_VERSION};

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 16;

/// Upper bound on how many bytes are pulled from a socket per readiness
/// notification. This bounds a single read, not the size of a frame:
/// the decoder itself enforces no payload-length cap.
pub const MAX_READ_CHUNK: usize = 1024 * 1024;

/// Frame header containing routing and length information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Channel this frame belongs to
    pub channel_id: ChannelId,
    /// Event type of the payload
    pub event: EventType,
    /// Length of the payload in bytes
    pub payload_length: u32,
}

impl FrameHeader {
    /// Create a new frame header
    pub fn new(channel_id: ChannelId, event: EventType, payload_length: u32) -> Self {
        Self {
            channel_id,
            event,
            payload_length,
        }
    }

    /// Header for an outgoing message
    pub fn for_message(message: &Message) -> Self {
        Self::new(
            message.channel_id,
            message.event,
            message.payload.len() as u32,
        )
    }

    /// Encode the header into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u32(PROTOCOL_VERSION);
        dst.put_u32(self.channel_id.as_u32());
        dst.put_u32(self.event.as_u32());
        dst.put_u32(self.payload_length);
    }

    /// Decode a header from exactly `HEADER_SIZE` bytes.
    ///
    /// Returns Err if the version is not the supported one or the event
    /// type is unknown; either way the stream is unusable.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self, ProtocolError> {
        let version = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch(version));
        }

        let channel_id = ChannelId::new(u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]));

        let event_raw = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let event =
            EventType::from_u32(event_raw).ok_or(ProtocolError::UnknownEventType(event_raw))?;

        let payload_length = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);

        Ok(Self {
            channel_id,
            event,
            payload_length,
        })
    }

    /// Peek a header at the front of `src` without consuming any bytes.
    ///
    /// Returns None if there aren't enough bytes in the buffer yet.
    /// Re-decoding on the next call is cheap and side-effect-free.
    pub fn peek(src: &BytesMut) -> Result<Option<Self>, ProtocolError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut fixed = [0u8; HEADER_SIZE];
        fixed.copy_from_slice(&src[..HEADER_SIZE]);
        Self::decode(&fixed).map(Some)
    }
}
