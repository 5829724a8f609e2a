//! Agent configuration

use serde::{Deserialize, Serialize};

use super::RetryConfig;

/// Configuration for the client agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Broker host to dial out to
    pub broker_host: String,

    /// Broker mux port
    pub mux_port: u16,

    /// Destination host channels are forwarded to
    pub dst_host: String,

    /// Destination port channels are forwarded to
    pub dst_port: u16,

    /// Retry policy for reconnecting to the broker
    pub retry: RetryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            mux_port: 6543,
            dst_host: "localhost".to_string(),
            dst_port: 8080,
            retry: RetryConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Address of the broker's mux endpoint
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.broker_host, self.mux_port)
    }

    /// Address of the downstream destination
    pub fn dst_addr(&self) -> String {
        format!("{}:{}", self.dst_host, self.dst_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_formatting() {
        let config = AgentConfig {
            broker_host: "broker.example".to_string(),
            mux_port: 6543,
            dst_host: "127.0.0.1".to_string(),
            dst_port: 80,
            ..AgentConfig::default()
        };
        assert_eq!(config.broker_addr(), "broker.example:6543");
        assert_eq!(config.dst_addr(), "127.0.0.1:80");
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AgentConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: AgentConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
