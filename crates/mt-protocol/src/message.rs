//! Message and event types for the muxtun protocol
//!
//! A `Message` is one unit of the wire protocol. `Traffic` messages
//! carry opaque application bytes for a channel; `Disconnect` signals
//! that the channel should be torn down on the receiving side and
//! carries no payload. `Connect` is reserved and never emitted by the
//! current protocol.

use bytes::Bytes;

use crate::channel::ChannelId;

/// Wire protocol version. Every frame carries this value; anything
/// else is treated as a corrupt stream.
pub const PROTOCOL_VERSION: u32 = 1;

/// Event type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EventType {
    /// Reserved, unused by the current protocol
    Connect = 1,
    /// Tear down the channel on the receiving side
    Disconnect = 2,
    /// Opaque application bytes for the channel
    Traffic = 3,
}

impl EventType {
    /// Convert to u32
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// Convert from u32
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Connect),
            2 => Some(Self::Disconnect),
            3 => Some(Self::Traffic),
            _ => None,
        }
    }
}

/// One protocol message: a channel id, an event type, and a payload.
///
/// An absent payload and an empty payload are the same thing on the
/// wire (payload length 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Channel this message belongs to
    pub channel_id: ChannelId,
    /// Event type
    pub event: EventType,
    /// Payload bytes, possibly empty
    pub payload: Bytes,
}

impl Message {
    /// Create a new message
    pub fn new(channel_id: ChannelId, event: EventType, payload: Bytes) -> Self {
        Self {
            channel_id,
            event,
            payload,
        }
    }

    /// Create a traffic message carrying application bytes
    pub fn traffic(channel_id: ChannelId, payload: Bytes) -> Self {
        Self::new(channel_id, EventType::Traffic, payload)
    }

    /// Create a disconnect message for a channel
    pub fn disconnect(channel_id: ChannelId) -> Self {
        Self::new(channel_id, EventType::Disconnect, Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_roundtrip() {
        for event in [EventType::Connect, EventType::Disconnect, EventType::Traffic] {
            let value = event.as_u32();
            let recovered = EventType::from_u32(value).unwrap();
            assert_eq!(recovered, event);
        }
    }

    #[test]
    fn test_event_type_unknown() {
        assert!(EventType::from_u32(0).is_none());
        assert!(EventType::from_u32(4).is_none());
        assert!(EventType::from_u32(u32::MAX).is_none());
    }

    #[test]
    fn test_disconnect_has_empty_payload() {
        let msg = Message::disconnect(ChannelId::new(7));
        assert_eq!(msg.event, EventType::Disconnect);
        assert!(msg.payload.is_empty());
    }
}
