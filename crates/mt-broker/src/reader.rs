//! Per-socket reader tasks
//!
//! Reader tasks own only the read half of their socket. They push
//! events into the coordinating loop and exit on EOF, error, or when
//! the loop goes away; they never touch shared state.

use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;

use mt_protocol::{ChannelId, FrameCodec, MAX_READ_CHUNK};

use crate::event::BrokerEvent;
use crate::registry::MuxId;

/// Spawn a task reading raw chunks from an assigned client socket
pub fn spawn_client_reader(
    id: ChannelId,
    mut read_half: OwnedReadHalf,
    tx: mpsc::Sender<BrokerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = BytesMut::new();
        loop {
            buf.reserve(MAX_READ_CHUNK);
            // take() caps the read even when the recycled buffer has
            // grown more capacity than one chunk
            match (&mut read_half).take(MAX_READ_CHUNK as u64).read_buf(&mut buf).await {
                Ok(0) => {
                    tracing::debug!(%id, "client socket EOF");
                    let _ = tx.send(BrokerEvent::ClientClosed { id }).await;
                    break;
                }
                Ok(read) => {
                    tracing::trace!(%id, bytes = read, "client bytes read");
                    let bytes = buf.split().freeze();
                    if tx.send(BrokerEvent::ClientData { id, bytes }).await.is_err() {
                        break; // Loop is gone
                    }
                }
                Err(e) => {
                    tracing::debug!(%id, error = %e, "client socket read error");
                    let _ = tx.send(BrokerEvent::ClientClosed { id }).await;
                    break;
                }
            }
        }
    })
}

/// Spawn a task decoding frames from a mux socket
pub fn spawn_mux_reader(
    mux: MuxId,
    read_half: OwnedReadHalf,
    tx: mpsc::Sender<BrokerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut frames = FramedRead::new(read_half, FrameCodec::new());
        while let Some(result) = frames.next().await {
            match result {
                Ok(message) => {
                    if tx
                        .send(BrokerEvent::MuxMessage { mux, message })
                        .await
                        .is_err()
                    {
                        return; // Loop is gone
                    }
                }
                Err(e) => {
                    // Version mismatch or corrupt header: the stream
                    // cannot be resynchronized, close it.
                    tracing::error!(%mux, error = %e, "protocol error on mux");
                    break;
                }
            }
        }
        let _ = tx.send(BrokerEvent::MuxClosed { mux }).await;
    })
}
