//! mt-broker: Public-facing broker for muxtun
//!
//! The broker listens on two TCP ports: a public port for external
//! client connections and a mux port that agents dial into. Each client
//! connection is assigned a channel id and bound to one connected mux;
//! its bytes are relayed as framed traffic over that mux, and frames
//! coming back are routed to the matching client socket.
//!
//! All connection state is owned by a single coordinating event loop.
//! Per-socket reader tasks never touch that state; they only feed
//! events into the loop over a channel, so every state transition for a
//! given channel id is serialized.

pub mod broker;
pub mod event;
pub mod reader;
pub mod registry;

pub use broker::Broker;
pub use event::BrokerEvent;
pub use registry::MuxId;
