//! Configuration management for muxtun
//!
//! Config files live under the platform config directory
//! (`$XDG_CONFIG_HOME/muxtun` on Linux). A missing or unreadable file
//! falls back to defaults with a warning rather than aborting startup.

mod agent;
mod broker;

pub use agent::AgentConfig;
pub use broker::BrokerConfig;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("muxtun")
}

/// Default path of the broker config file
pub fn broker_config_path() -> PathBuf {
    default_config_dir().join("broker.toml")
}

/// Default path of the agent config file
pub fn agent_config_path() -> PathBuf {
    default_config_dir().join("agent.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration from a file, falling back to defaults if the file
/// is missing or unreadable
pub fn load_or_default<T>(path: &Path) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    if !path.exists() {
        return T::default();
    }

    load_config(path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {:?}: {}", path, e);
        T::default()
    })
}

/// Retry policy configuration: fixed delay between attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay between reconnection attempts
    #[serde(with = "duration_secs")]
    pub interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

// Helper module for Duration serialization as whole seconds
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_missing_file() {
        let result: Result<BrokerConfig, _> = load_config(Path::new("/nonexistent/broker.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config: AgentConfig = load_or_default(Path::new("/nonexistent/agent.toml"));
        assert_eq!(config.retry.interval, Duration::from_secs(5));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "listen_host = \"127.0.0.1\"\nmux_port = 7000\nclient_port = 7001"
        )
        .unwrap();

        let config: BrokerConfig = load_config(file.path()).unwrap();
        assert_eq!(config.listen_host, "127.0.0.1");
        assert_eq!(config.mux_port, 7000);
        assert_eq!(config.client_port, 7001);
    }

    #[test]
    fn test_load_or_default_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml [[[").unwrap();

        let config: BrokerConfig = load_or_default(file.path());
        assert_eq!(config, BrokerConfig::default());
    }

    #[test]
    fn test_retry_config_toml_roundtrip() {
        let retry = RetryConfig {
            interval: Duration::from_secs(9),
        };
        let text = toml::to_string(&retry).unwrap();
        let parsed: RetryConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.interval, Duration::from_secs(9));
    }
}
