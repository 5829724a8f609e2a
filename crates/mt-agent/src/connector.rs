//! Outbound mux connector
//!
//! Establishes the long-lived connection to the broker's mux port,
//! cycling `Disconnected -> Connecting -> Connected` with the retry
//! policy between failed attempts.

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::backoff::FixedBackoff;

/// Connection state of the mux link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    /// No connection and no attempt in flight
    Disconnected,
    /// Dial in progress
    Connecting,
    /// Mux link established
    Connected,
}

/// Dials the broker's mux endpoint with automatic retry
pub struct Connector {
    /// Broker mux address
    addr: String,
    /// Retry policy between failed attempts
    backoff: FixedBackoff,
    /// Current link state
    state: ConnectState,
}

impl Connector {
    /// Create a new connector
    pub fn new(addr: String, backoff: FixedBackoff) -> Self {
        Self {
            addr,
            backoff,
            state: ConnectState::Disconnected,
        }
    }

    /// Current link state
    pub fn state(&self) -> ConnectState {
        self.state
    }

    /// Note that an established link went away
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectState::Disconnected;
    }

    /// Dial until connected. Returns None only when cancelled.
    pub async fn connect(&mut self, cancel: &CancellationToken) -> Option<TcpStream> {
        loop {
            self.state = ConnectState::Connecting;
            tracing::debug!(addr = %self.addr, "connecting to broker");

            match TcpStream::connect(&self.addr).await {
                Ok(stream) => {
                    self.state = ConnectState::Connected;
                    tracing::info!(addr = %self.addr, "connected to broker");
                    return Some(stream);
                }
                Err(e) => {
                    self.state = ConnectState::Disconnected;
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        addr = %self.addr,
                        error = %e,
                        ?delay,
                        "failed to connect to broker, retrying"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
