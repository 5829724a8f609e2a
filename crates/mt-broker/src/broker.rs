//! Broker event loop
//!
//! Accepts client and mux connections and routes bytes between them.
//! Channel lifecycle: a freshly accepted client is either parked
//! (no mux yet) or assigned to a uniformly random mux; the binding
//! holds until either side closes, or until the bound mux itself fails
//! and takes every channel bound to it down with it.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::SinkExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use mt_core::BrokerConfig;
use mt_protocol::{ChannelId, EventType, FrameCodec, Message};

use crate::event::BrokerEvent;
use crate::reader::{spawn_client_reader, spawn_mux_reader};
use crate::registry::{ChannelRecord, MuxHandle, MuxId, Registry};

/// Capacity of the event channel between reader tasks and the loop.
///
/// Readers block when the loop falls behind, so this also acts as the
/// only buffering between a fast client and a slow mux.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The broker: two listeners plus the connection registry
pub struct Broker {
    client_listener: TcpListener,
    mux_listener: TcpListener,
    registry: Registry,
    event_tx: mpsc::Sender<BrokerEvent>,
    event_rx: mpsc::Receiver<BrokerEvent>,
}

impl Broker {
    /// Bind both listeners. Failure to bind either port is fatal.
    pub async fn bind(config: &BrokerConfig) -> Result<Self> {
        let client_listener = TcpListener::bind(config.client_addr())
            .await
            .with_context(|| format!("Failed to bind client listener on {}", config.client_addr()))?;
        let mux_listener = TcpListener::bind(config.mux_addr())
            .await
            .with_context(|| format!("Failed to bind mux listener on {}", config.mux_addr()))?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client_listener,
            mux_listener,
            registry: Registry::new(),
            event_tx,
            event_rx,
        })
    }

    /// Local address of the public client listener
    pub fn client_addr(&self) -> Result<SocketAddr> {
        self.client_listener.local_addr().map_err(Into::into)
    }

    /// Local address of the mux listener
    pub fn mux_addr(&self) -> Result<SocketAddr> {
        self.mux_listener.local_addr().map_err(Into::into)
    }

    /// Run the event loop until cancelled.
    ///
    /// Connection-scoped failures are cleaned up locally and never end
    /// the loop. An accept error on the public listener is fatal: the
    /// broker returns the error so the process can be restarted from
    /// outside.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            client = %self.client_addr()?,
            mux = %self.mux_addr()?,
            "broker listening"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("broker shutting down");
                    return Ok(());
                }

                result = self.client_listener.accept() => {
                    let (stream, peer) = result.context("Client listener failed")?;
                    self.accept_client(stream, peer);
                }

                result = self.mux_listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.accept_mux(stream, peer),
                        Err(e) => tracing::error!(error = %e, "mux listener accept failed"),
                    }
                }

                event = self.event_rx.recv() => {
                    // The loop holds a sender, so recv never yields None
                    if let Some(event) = event {
                        self.handle_event(event).await;
                    }
                }
            }
        }
    }

    /// A new client connection: allocate a channel id and either assign
    /// it to a random mux or park it until one connects
    fn accept_client(&mut self, stream: TcpStream, peer: SocketAddr) {
        let id = self.registry.allocate_channel_id();
        tracing::info!(%id, %peer, "accepted client connection");

        match self.registry.pick_mux() {
            Some(mux) => self.assign(id, stream, mux),
            None => {
                tracing::info!(%id, "no mux connected, parking client");
                self.registry.park_pending(id, stream);
            }
        }
    }

    /// A new mux connection: start reading frames from it and promote
    /// every parked client
    fn accept_mux(&mut self, stream: TcpStream, peer: SocketAddr) {
        let mux = self.registry.allocate_mux_id();
        let (read_half, write_half) = stream.into_split();
        let reader = spawn_mux_reader(mux, read_half, self.event_tx.clone());
        let writer = FramedWrite::new(write_half, FrameCodec::new());
        self.registry.insert_mux(mux, MuxHandle { writer, reader });
        tracing::info!(%mux, %peer, "accepted mux connection");

        self.promote_pending();
    }

    /// Bind a client socket to a mux and start reading from it
    fn assign(&mut self, id: ChannelId, stream: TcpStream, mux: MuxId) {
        let (read_half, write_half) = stream.into_split();
        let reader = spawn_client_reader(id, read_half, self.event_tx.clone());
        self.registry.insert_channel(
            id,
            ChannelRecord {
                writer: write_half,
                mux,
                reader,
            },
        );
        tracing::debug!(%id, %mux, "channel assigned");
    }

    /// Promote every parked client, each to an independently chosen
    /// random mux (not necessarily the newest one)
    fn promote_pending(&mut self) {
        if !self.registry.has_muxes() {
            return;
        }

        for (id, stream) in self.registry.take_pending() {
            match self.registry.pick_mux() {
                Some(mux) => {
                    tracing::info!(%id, %mux, "promoting parked client");
                    self.assign(id, stream, mux);
                }
                None => self.registry.park_pending(id, stream),
            }
        }
    }

    async fn handle_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::ClientData { id, bytes } => self.forward_client_bytes(id, bytes).await,
            BrokerEvent::ClientClosed { id } => self.close_channel_from_client(id).await,
            BrokerEvent::MuxMessage { mux, message } => self.handle_mux_message(mux, message).await,
            BrokerEvent::MuxClosed { mux } => self.close_mux(mux),
        }
    }

    /// Wrap raw client bytes into a traffic frame for the bound mux
    async fn forward_client_bytes(&mut self, id: ChannelId, bytes: Bytes) {
        let Some(mux) = self.registry.channel_mux(id) else {
            tracing::trace!(%id, "bytes for unknown channel dropped");
            return;
        };

        if !self.send_to_mux(mux, Message::traffic(id, bytes)).await {
            self.close_mux(mux);
        }
    }

    /// Write a frame to a mux. Returns false if the write failed and
    /// the mux should be torn down.
    async fn send_to_mux(&mut self, mux: MuxId, message: Message) -> bool {
        let Some(handle) = self.registry.mux_mut(mux) else {
            return true; // Already gone, nothing to tear down
        };

        match handle.writer.send(message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%mux, error = %e, "mux write failed");
                false
            }
        }
    }

    /// Client-side closure (EOF or error): tell the bound mux the
    /// channel is gone, then drop the record
    async fn close_channel_from_client(&mut self, id: ChannelId) {
        let Some(record) = self.registry.remove_channel(id) else {
            return;
        };
        record.reader.abort();
        tracing::info!(%id, "client connection closed");

        if !self.send_to_mux(record.mux, Message::disconnect(id)).await {
            self.close_mux(record.mux);
        }
    }

    async fn handle_mux_message(&mut self, mux: MuxId, message: Message) {
        let id = message.channel_id;
        match message.event {
            // Agent-side closure: close the client socket, drop the record
            EventType::Disconnect => {
                match self.registry.remove_channel(id) {
                    Some(record) => {
                        record.reader.abort();
                        tracing::info!(%id, %mux, "closing client on disconnect from mux");
                        // Dropping the record closes the client socket
                    }
                    None => tracing::trace!(%id, "disconnect for unknown channel dropped"),
                }
            }

            // Payload goes verbatim to the matched client socket
            EventType::Traffic => {
                let write_failed = match self.registry.channel_writer_mut(id) {
                    Some(writer) => match writer.write_all(&message.payload).await {
                        Ok(()) => false,
                        Err(e) => {
                            tracing::warn!(%id, error = %e, "client write failed");
                            true
                        }
                    },
                    None => {
                        tracing::trace!(%id, "traffic for unknown channel dropped");
                        false
                    }
                };

                if write_failed {
                    self.close_channel_from_client(id).await;
                }
            }

            EventType::Connect => {
                tracing::debug!(%id, %mux, "ignoring reserved connect event");
            }
        }
    }

    /// Mux failure: every channel bound to it closes too. Surviving
    /// client sockets are not reassigned to another mux.
    fn close_mux(&mut self, mux: MuxId) {
        let Some(handle) = self.registry.remove_mux(mux) else {
            return;
        };
        handle.reader.abort();
        tracing::warn!(%mux, "mux connection closed");

        for (id, record) in self.registry.remove_channels_bound_to(mux) {
            record.reader.abort();
            tracing::info!(%id, %mux, "closing channel bound to failed mux");
        }
    }
}
