//! Broker configuration

use serde::{Deserialize, Serialize};

/// Configuration for the broker daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Host to bind both listeners to
    pub listen_host: String,

    /// Port agents dial into with mux connections
    pub mux_port: u16,

    /// Public port external clients connect to
    pub client_port: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            mux_port: 6543,
            client_port: 6544,
        }
    }
}

impl BrokerConfig {
    /// Bind address for the mux listener
    pub fn mux_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.mux_port)
    }

    /// Bind address for the public client listener
    pub fn client_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.client_port)
    }
}
