//! mt-agent: Private-network agent for muxtun
//!
//! The agent dials outward to the broker's mux port, reconnecting with
//! fixed backoff for as long as it runs. Traffic frames arriving on the
//! mux are demultiplexed into per-channel downstream TCP connections
//! (dialed lazily on first sight of a channel id), and downstream bytes
//! are re-multiplexed into traffic frames going back.

pub mod agent;
pub mod backoff;
pub mod connector;
pub mod session;

pub use agent::Agent;
pub use backoff::FixedBackoff;
pub use connector::{ConnectState, Connector};
pub use session::{Session, SessionEnd};
