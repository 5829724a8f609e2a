//! mt-core: Shared configuration and error types for muxtun
//!
//! This crate provides the configuration structures and file loading
//! used by the broker and agent binaries. The reactor cores consume
//! only already-resolved values; file discovery and parsing live here.

pub mod config;
pub mod error;

pub use config::{AgentConfig, BrokerConfig, RetryConfig};
pub use error::ConfigError;
