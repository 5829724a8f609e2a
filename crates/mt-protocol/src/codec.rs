//! Tokio codec for framed protocol messages
//!
//! The decoder is a pure function over the accumulated read buffer: it
//! consumes nothing until a complete frame (header plus declared
//! payload) is buffered, so an incomplete frame always leaves the
//! buffer holding exactly the unconsumed bytes. Callers drain zero or
//! more complete messages per read by looping until `None`.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, HEADER_SIZE};
use crate::message::Message;

/// Codec for encoding/decoding protocol frames
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Peek the header without consuming; a partial frame leaves the
        // buffer untouched and the header is re-decoded next call.
        let header = match FrameHeader::peek(src)? {
            Some(h) => h,
            None => return Ok(None), // Need more data
        };

        let payload_len = header.payload_length as usize;
        if src.len() < HEADER_SIZE + payload_len {
            return Ok(None); // Frame incomplete, wait for more bytes
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(payload_len).freeze();

        Ok(Some(Message::new(header.channel_id, header.event, payload)))
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        FrameHeader::for_message(&message).encode(dst);
        dst.extend_from_slice(&message.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelId;
    use crate::message::EventType;
    use bytes::Bytes;

    fn encoded(message: Message) -> BytesMut {
        let mut buf = BytesMut::new();
        FrameCodec::new().encode(message, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_codec_roundtrip() {
        let message = Message::traffic(ChannelId::new(42), Bytes::from("Hello, world!"));
        let mut buf = encoded(message.clone());

        assert_eq!(buf.len(), HEADER_SIZE + 13);

        let decoded = FrameCodec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, message);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_empty_payload() {
        let message = Message::disconnect(ChannelId::new(7));
        let mut buf = encoded(message.clone());

        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = FrameCodec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, message);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_partial_read_every_split() {
        let message = Message::traffic(ChannelId::new(3), Bytes::from("partial"));
        let full = encoded(message.clone());

        for split in 0..full.len() {
            let mut codec = FrameCodec::new();
            let mut buf = BytesMut::from(&full[..split]);

            // Incomplete: no message, buffer unchanged
            assert!(codec.decode(&mut buf).unwrap().is_none());
            assert_eq!(&buf[..], &full[..split]);

            // Deliver the remainder and the original message appears
            buf.extend_from_slice(&full[split..]);
            let decoded = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded, message);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_codec_multi_frame_drain() {
        let messages: Vec<Message> = (0..5)
            .map(|i| Message::traffic(ChannelId::new(i), Bytes::from(format!("payload-{}", i))))
            .collect();

        let mut buf = BytesMut::new();
        let mut codec = FrameCodec::new();
        for message in &messages {
            codec.encode(message.clone(), &mut buf).unwrap();
        }

        let mut decoded = Vec::new();
        while let Some(message) = codec.decode(&mut buf).unwrap() {
            decoded.push(message);
        }

        assert_eq!(decoded, messages);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_rejects_bad_version() {
        let message = Message::traffic(ChannelId::new(1), Bytes::from("x"));
        let mut buf = encoded(message);
        buf[0..4].copy_from_slice(&9u32.to_be_bytes());

        let result = FrameCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::VersionMismatch(9))));
    }

    #[test]
    fn test_codec_rejects_unknown_event() {
        let message = Message::traffic(ChannelId::new(1), Bytes::from("x"));
        let mut buf = encoded(message);
        buf[8..12].copy_from_slice(&77u32.to_be_bytes());

        let result = FrameCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::UnknownEventType(77))));
    }

    #[test]
    fn test_decode_preserves_trailing_bytes() {
        let first = Message::traffic(ChannelId::new(1), Bytes::from("one"));
        let second = Message::disconnect(ChannelId::new(2));

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(first.clone(), &mut buf).unwrap();
        codec.encode(second.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), first);
        // Remainder is exactly the second frame
        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), second);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }
}
