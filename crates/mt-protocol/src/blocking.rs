//! Blocking send/receive helpers
//!
//! For synchronous call sites (test harnesses, simple send-and-receive
//! tools) that work against `std::io` streams. The nonblocking reactor
//! paths use [`crate::codec::FrameCodec`] instead.

use std::io::{Read, Write};

use bytes::{Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, HEADER_SIZE};
use crate::message::Message;

/// Read exactly `n` bytes, accumulating partial reads.
///
/// Fails with [`ProtocolError::StreamClosed`] if the stream ends before
/// `n` bytes are collected.
pub fn read_exact<R: Read>(reader: &mut R, n: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        match reader.read(&mut buf[filled..])? {
            0 => return Err(ProtocolError::StreamClosed),
            read => filled += read,
        }
    }
    Ok(buf)
}

/// Read one complete message from a blocking stream
pub fn recv<R: Read>(reader: &mut R) -> Result<Message, ProtocolError> {
    let head = read_exact(reader, HEADER_SIZE)?;
    let mut fixed = [0u8; HEADER_SIZE];
    fixed.copy_from_slice(&head);
    let header = FrameHeader::decode(&fixed)?;

    let payload = if header.payload_length > 0 {
        Bytes::from(read_exact(reader, header.payload_length as usize)?)
    } else {
        Bytes::new()
    };

    Ok(Message::new(header.channel_id, header.event, payload))
}

/// Write one complete message to a blocking stream
pub fn send<W: Write>(writer: &mut W, message: &Message) -> Result<(), ProtocolError> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + message.payload.len());
    FrameHeader::for_message(message).encode(&mut buf);
    buf.extend_from_slice(&message.payload);
    writer.write_all(&buf)?;
    Ok(())
}
