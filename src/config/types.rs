// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration types.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::ConfigError;
use crate::logging::parse_level;

/// Standard OTLP/HTTP port.
pub const DEFAULT_PORT: u16 = 4318;

/// 10 MiB, applied to the raw and the decompressed body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_BROADCAST_CAPACITY: usize = crate::notifier::DEFAULT_CAPACITY;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Receiver configuration as written in a config file.
///
/// Every field is optional; unset fields fall through to the next source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverFileConfig {
    /// Interface to listen on, e.g. `127.0.0.1` or `0.0.0.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Request body limit in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_body_bytes: Option<usize>,

    /// Updates buffered per change-notification subscriber.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_capacity: Option<usize>,

    /// Bind an OS-assigned port when the configured one is taken.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_to_ephemeral_port: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_cors: Option<bool>,

    /// Diagnostic log level (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Fully resolved receiver configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub max_body_bytes: usize,
    pub broadcast_capacity: usize,
    pub fallback_to_ephemeral_port: bool,
    pub enable_cors: bool,
    pub log_level: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            fallback_to_ephemeral_port: false,
            enable_cors: true,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ResolvedConfig {
    /// Address the listener binds.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Parsed log level; `info` if the configured name is not a level.
    pub fn level(&self) -> Level {
        parse_level(&self.log_level).unwrap_or(Level::INFO)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::invalid("maxBodyBytes", "must be greater than 0"));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::invalid("broadcastCapacity", "must be greater than 0"));
        }
        if parse_level(&self.log_level).is_none() {
            return Err(ConfigError::invalid(
                "logLevel",
                format!("unknown level '{}'", self.log_level),
            ));
        }
        Ok(())
    }
}

impl From<&ResolvedConfig> for ReceiverFileConfig {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            bind_address: Some(config.bind_address.to_string()),
            port: Some(config.port),
            max_body_bytes: Some(config.max_body_bytes),
            broadcast_capacity: Some(config.broadcast_capacity),
            fallback_to_ephemeral_port: Some(config.fallback_to_ephemeral_port),
            enable_cors: Some(config.enable_cors),
            log_level: Some(config.log_level.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolvedConfig::default();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:4318");
        assert_eq!(config.max_body_bytes, 10_485_760);
        assert_eq!(config.broadcast_capacity, 100);
        assert!(!config.fallback_to_ephemeral_port);
        assert!(config.enable_cors);
        assert_eq!(config.level(), Level::INFO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_config_camel_case() {
        let config: ReceiverFileConfig = serde_json::from_str(
            r#"{"bindAddress": "0.0.0.0", "port": 9000, "fallbackToEphemeralPort": true}"#,
        )
        .unwrap();
        assert_eq!(config.bind_address.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.port, Some(9000));
        assert_eq!(config.fallback_to_ephemeral_port, Some(true));
        assert!(config.enable_cors.is_none());

        let json = serde_json::to_string(&ReceiverFileConfig::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ResolvedConfig {
            max_body_bytes: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "maxBodyBytes"
        ));

        let config = ResolvedConfig {
            broadcast_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ResolvedConfig {
            log_level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_config_from_resolved() {
        let file = ReceiverFileConfig::from(&ResolvedConfig::default());
        assert_eq!(file.bind_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(file.port, Some(DEFAULT_PORT));
        assert_eq!(file.log_level.as_deref(), Some("info"));
    }
}
