//! Agent lifecycle: connect, run a session, reconnect
//!
//! Once started the agent never exits on its own; a dead mux session
//! only sends it back into the reconnect loop. Cancellation is the
//! only way out.

use tokio_util::sync::CancellationToken;

use mt_core::AgentConfig;

use crate::backoff::FixedBackoff;
use crate::connector::Connector;
use crate::session::{Session, SessionEnd};

/// The muxtun agent
pub struct Agent {
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Run until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        let mut connector = Connector::new(
            self.config.broker_addr(),
            FixedBackoff::from_config(&self.config.retry),
        );

        loop {
            let Some(mux) = connector.connect(&cancel).await else {
                break; // Cancelled while dialing
            };

            let session = Session::new(mux, self.config.dst_addr());
            let end = session.run(&cancel).await;
            connector.mark_disconnected();

            match end {
                SessionEnd::Cancelled => break,
                end => {
                    tracing::warn!(reason = ?end, "mux session ended, reconnecting");
                }
            }
        }

        tracing::info!("agent stopped");
    }
}
