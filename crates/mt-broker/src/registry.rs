//! Connection registry owned by the broker's event loop
//!
//! One owned structure tracks every socket the broker knows about, in
//! exactly one role at a time: parked pending clients, assigned channel
//! records, and mux handles. Channel ids come from a wrapping counter,
//! so an id repeats only after 2^32 allocations in one process.

use std::collections::HashMap;
use std::fmt;

use rand::seq::IteratorRandom;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;

use mt_protocol::{ChannelId, FrameCodec};

/// Identifier for one mux connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MuxId(pub u64);

impl fmt::Display for MuxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mux-{}", self.0)
    }
}

/// An assigned client channel. The mux binding is fixed for the
/// channel's lifetime; there is no re-balancing after assignment.
pub struct ChannelRecord {
    /// Write half of the client socket
    pub writer: OwnedWriteHalf,
    /// The mux this channel is bound to
    pub mux: MuxId,
    /// Reader task feeding client bytes into the event loop
    pub reader: JoinHandle<()>,
}

/// A connected mux link
pub struct MuxHandle {
    /// Framed write half of the mux socket
    pub writer: FramedWrite<OwnedWriteHalf, FrameCodec>,
    /// Reader task feeding decoded frames into the event loop
    pub reader: JoinHandle<()>,
}

/// All connection state, owned by the coordinating loop
pub struct Registry {
    next_channel_id: u32,
    next_mux_id: u64,
    /// Clients accepted before any mux was available. The socket is not
    /// read while parked; bytes wait in the kernel buffer.
    pending: HashMap<ChannelId, TcpStream>,
    /// Assigned channels
    channels: HashMap<ChannelId, ChannelRecord>,
    /// Connected muxes
    muxes: HashMap<MuxId, MuxHandle>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            next_channel_id: 0,
            next_mux_id: 0,
            pending: HashMap::new(),
            channels: HashMap::new(),
            muxes: HashMap::new(),
        }
    }

    /// Allocate the next channel id. The counter wraps; reuse would
    /// take 2^32 live allocations in one process.
    pub fn allocate_channel_id(&mut self) -> ChannelId {
        let id = ChannelId::new(self.next_channel_id);
        self.next_channel_id = self.next_channel_id.wrapping_add(1);
        id
    }

    /// Allocate the next mux id
    pub fn allocate_mux_id(&mut self) -> MuxId {
        let id = MuxId(self.next_mux_id);
        self.next_mux_id += 1;
        id
    }

    /// Whether at least one mux is connected
    pub fn has_muxes(&self) -> bool {
        !self.muxes.is_empty()
    }

    /// Pick a uniformly random connected mux
    pub fn pick_mux(&self) -> Option<MuxId> {
        self.muxes.keys().choose(&mut rand::thread_rng()).copied()
    }

    /// Park a client socket until a mux becomes available
    pub fn park_pending(&mut self, id: ChannelId, stream: TcpStream) {
        self.pending.insert(id, stream);
    }

    /// Take every parked client for promotion
    pub fn take_pending(&mut self) -> Vec<(ChannelId, TcpStream)> {
        self.pending.drain().collect()
    }

    /// Number of parked clients
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Record an assigned channel
    pub fn insert_channel(&mut self, id: ChannelId, record: ChannelRecord) {
        self.channels.insert(id, record);
    }

    /// Remove an assigned channel
    pub fn remove_channel(&mut self, id: ChannelId) -> Option<ChannelRecord> {
        self.channels.remove(&id)
    }

    /// The mux a channel is bound to
    pub fn channel_mux(&self, id: ChannelId) -> Option<MuxId> {
        self.channels.get(&id).map(|record| record.mux)
    }

    /// Mutable access to a channel's client writer
    pub fn channel_writer_mut(&mut self, id: ChannelId) -> Option<&mut OwnedWriteHalf> {
        self.channels.get_mut(&id).map(|record| &mut record.writer)
    }

    /// Record a connected mux
    pub fn insert_mux(&mut self, mux: MuxId, handle: MuxHandle) {
        self.muxes.insert(mux, handle);
    }

    /// Remove a mux
    pub fn remove_mux(&mut self, mux: MuxId) -> Option<MuxHandle> {
        self.muxes.remove(&mux)
    }

    /// Mutable access to a mux handle
    pub fn mux_mut(&mut self, mux: MuxId) -> Option<&mut MuxHandle> {
        self.muxes.get_mut(&mux)
    }

    /// Remove and return every channel bound to a mux
    pub fn remove_channels_bound_to(&mut self, mux: MuxId) -> Vec<(ChannelId, ChannelRecord)> {
        let ids: Vec<ChannelId> = self
            .channels
            .iter()
            .filter(|(_, record)| record.mux == mux)
            .map(|(id, _)| *id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.channels.remove(&id).map(|record| (id, record)))
            .collect()
    }

    /// Number of assigned channels
    pub fn channel_len(&self) -> usize {
        self.channels.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ids_monotonic() {
        let mut registry = Registry::new();
        let a = registry.allocate_channel_id();
        let b = registry.allocate_channel_id();
        let c = registry.allocate_channel_id();
        assert!(a.as_u32() < b.as_u32());
        assert!(b.as_u32() < c.as_u32());
    }

    #[test]
    fn test_channel_id_counter_wraps_without_panic() {
        let mut registry = Registry::new();
        registry.next_channel_id = u32::MAX;
        let last = registry.allocate_channel_id();
        let wrapped = registry.allocate_channel_id();
        assert_eq!(last.as_u32(), u32::MAX);
        assert_eq!(wrapped.as_u32(), 0);
    }

    #[test]
    fn test_pick_mux_empty() {
        let registry = Registry::new();
        assert!(!registry.has_muxes());
        assert!(registry.pick_mux().is_none());
    }

    #[tokio::test]
    async fn test_pending_park_and_take() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut registry = Registry::new();
        for _ in 0..3 {
            let _client = TcpStream::connect(addr).await.unwrap();
            let (stream, _) = listener.accept().await.unwrap();
            let id = registry.allocate_channel_id();
            registry.park_pending(id, stream);
        }

        assert_eq!(registry.pending_len(), 3);
        let taken = registry.take_pending();
        assert_eq!(taken.len(), 3);
        assert_eq!(registry.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_remove_channels_bound_to() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut registry = Registry::new();
        let mux_a = registry.allocate_mux_id();
        let mux_b = registry.allocate_mux_id();

        let make_record = |mux: MuxId| {
            let listener = &listener;
            async move {
                let _client = TcpStream::connect(addr).await.unwrap();
                let (stream, _) = listener.accept().await.unwrap();
                let (_read, writer) = stream.into_split();
                ChannelRecord {
                    writer,
                    mux,
                    reader: tokio::spawn(async {}),
                }
            }
        };

        for i in 0..4 {
            let mux = if i % 2 == 0 { mux_a } else { mux_b };
            let record = make_record(mux).await;
            let id = registry.allocate_channel_id();
            registry.insert_channel(id, record);
        }

        let removed = registry.remove_channels_bound_to(mux_a);
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.channel_len(), 2);
        for (id, _) in &removed {
            assert!(registry.channel_mux(*id).is_none());
        }
    }
}
