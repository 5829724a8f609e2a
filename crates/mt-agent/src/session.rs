//! One established mux session
//!
//! Runs the agent's event loop for the lifetime of a single mux
//! connection: frames from the broker are demultiplexed into
//! per-channel downstream connections, downstream bytes are wrapped
//! into traffic frames going back. The session owns every downstream
//! binding; downstream reader tasks only feed events into it.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use mt_protocol::{ChannelId, EventType, FrameCodec, Message, MAX_READ_CHUNK};

/// Capacity of the event channel between downstream readers and the
/// session loop
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The broker closed the mux connection (or the write side failed);
    /// the agent should reconnect
    MuxClosed,
    /// Corrupt frame on the mux; the connection is unusable
    ProtocolError,
    /// Stop was requested
    Cancelled,
}

/// Events from downstream reader tasks
#[derive(Debug)]
enum DownstreamEvent {
    /// Bytes read from a downstream socket
    Data { id: ChannelId, bytes: Bytes },
    /// Downstream socket reached EOF or errored
    Closed { id: ChannelId },
}

/// A live `channel id <-> downstream socket` association
struct DownstreamBinding {
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

/// Event loop over one mux connection and its downstream sockets
pub struct Session {
    dst_addr: String,
    frames_in: FramedRead<OwnedReadHalf, FrameCodec>,
    frames_out: FramedWrite<OwnedWriteHalf, FrameCodec>,
    bindings: HashMap<ChannelId, DownstreamBinding>,
    event_tx: mpsc::Sender<DownstreamEvent>,
    event_rx: mpsc::Receiver<DownstreamEvent>,
}

impl Session {
    /// Wrap an established mux connection
    pub fn new(mux: TcpStream, dst_addr: String) -> Self {
        let (read_half, write_half) = mux.into_split();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            dst_addr,
            frames_in: FramedRead::new(read_half, FrameCodec::new()),
            frames_out: FramedWrite::new(write_half, FrameCodec::new()),
            bindings: HashMap::new(),
            event_tx,
            event_rx,
        }
    }

    /// Run until the mux dies or the session is cancelled. All
    /// downstream bindings are torn down on the way out.
    pub async fn run(mut self, cancel: &CancellationToken) -> SessionEnd {
        let end = loop {
            tokio::select! {
                _ = cancel.cancelled() => break SessionEnd::Cancelled,

                frame = self.frames_in.next() => match frame {
                    Some(Ok(message)) => {
                        if let Some(end) = self.handle_mux_message(message).await {
                            break end;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "protocol error on mux");
                        break SessionEnd::ProtocolError;
                    }
                    None => {
                        tracing::warn!("mux connection closed by broker");
                        break SessionEnd::MuxClosed;
                    }
                },

                event = self.event_rx.recv() => {
                    // The session holds a sender, so recv never yields None
                    if let Some(event) = event {
                        if let Some(end) = self.handle_downstream_event(event).await {
                            break end;
                        }
                    }
                }
            }
        };

        self.teardown();
        end
    }

    async fn handle_mux_message(&mut self, message: Message) -> Option<SessionEnd> {
        match message.event {
            EventType::Disconnect => {
                let id = message.channel_id;
                match self.bindings.remove(&id) {
                    Some(binding) => {
                        binding.reader.abort();
                        tracing::info!(%id, "closed downstream on disconnect");
                    }
                    None => tracing::trace!(%id, "disconnect for unknown channel dropped"),
                }
                None
            }

            EventType::Traffic => self.deliver_traffic(message).await,

            EventType::Connect => {
                tracing::debug!(id = %message.channel_id, "ignoring reserved connect event");
                None
            }
        }
    }

    /// Write a traffic payload to the channel's downstream socket,
    /// dialing the destination first for an unseen channel id
    async fn deliver_traffic(&mut self, message: Message) -> Option<SessionEnd> {
        let id = message.channel_id;

        if !self.bindings.contains_key(&id) {
            match TcpStream::connect(&self.dst_addr).await {
                Ok(stream) => {
                    let (read_half, write_half) = stream.into_split();
                    let reader = spawn_downstream_reader(id, read_half, self.event_tx.clone());
                    self.bindings.insert(
                        id,
                        DownstreamBinding {
                            writer: write_half,
                            reader,
                        },
                    );
                    tracing::info!(%id, dst = %self.dst_addr, "dialed downstream for new channel");
                }
                Err(e) => {
                    // Known gap: the frame is dropped and nothing is
                    // propagated back toward the broker's client.
                    tracing::error!(
                        %id,
                        dst = %self.dst_addr,
                        error = %e,
                        "downstream dial failed, dropping frame"
                    );
                    return None;
                }
            }
        }

        let write_failed = match self.bindings.get_mut(&id) {
            Some(binding) => match binding.writer.write_all(&message.payload).await {
                Ok(()) => false,
                Err(e) => {
                    tracing::warn!(%id, error = %e, "downstream write failed");
                    true
                }
            },
            None => false,
        };

        if write_failed {
            self.close_binding(id);
        }
        None
    }

    async fn handle_downstream_event(&mut self, event: DownstreamEvent) -> Option<SessionEnd> {
        match event {
            DownstreamEvent::Data { id, bytes } => {
                match self.frames_out.send(Message::traffic(id, bytes)).await {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!(error = %e, "mux write failed");
                        Some(SessionEnd::MuxClosed)
                    }
                }
            }

            // Downstream-initiated closure: drop the binding. The
            // broker is not notified; only broker-driven disconnects
            // flow the other way.
            DownstreamEvent::Closed { id } => {
                self.close_binding(id);
                None
            }
        }
    }

    fn close_binding(&mut self, id: ChannelId) {
        if let Some(binding) = self.bindings.remove(&id) {
            binding.reader.abort();
            tracing::debug!(%id, "downstream connection closed");
        }
    }

    fn teardown(&mut self) {
        for (id, binding) in self.bindings.drain() {
            binding.reader.abort();
            tracing::debug!(%id, "downstream closed on session end");
        }
    }
}

/// Spawn a task reading raw chunks from a downstream socket
fn spawn_downstream_reader(
    id: ChannelId,
    mut read_half: OwnedReadHalf,
    tx: mpsc::Sender<DownstreamEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = BytesMut::new();
        loop {
            buf.reserve(MAX_READ_CHUNK);
            // take() caps the read even when the recycled buffer has
            // grown more capacity than one chunk
            match (&mut read_half).take(MAX_READ_CHUNK as u64).read_buf(&mut buf).await {
                Ok(0) => {
                    tracing::debug!(%id, "downstream EOF");
                    let _ = tx.send(DownstreamEvent::Closed { id }).await;
                    break;
                }
                Ok(read) => {
                    tracing::trace!(%id, bytes = read, "downstream bytes read");
                    let bytes = buf.split().freeze();
                    if tx.send(DownstreamEvent::Data { id, bytes }).await.is_err() {
                        break; // Session is gone
                    }
                }
                Err(e) => {
                    tracing::debug!(%id, error = %e, "downstream read error");
                    let _ = tx.send(DownstreamEvent::Closed { id }).await;
                    break;
                }
            }
        }
    })
}
