// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::net::IpAddr;

use crate::error::ConfigError;

use super::types::{ReceiverFileConfig, ResolvedConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub bind_address: Option<IpAddr>,
    pub port: Option<u16>,
    pub max_body_bytes: Option<usize>,
    pub fallback_to_ephemeral_port: Option<bool>,
    pub enable_cors: Option<bool>,
    pub log_level: Option<String>,
}

/// Merge configuration sources and validate the result.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.otlp-receiver.local.json)
/// 3. Workspace config (.otlp-receiver.json)
/// 4. Global config (~/.otlp-receiver/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<ReceiverFileConfig>,
    workspace: Option<ReceiverFileConfig>,
    local: Option<ReceiverFileConfig>,
    cli: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let mut result = ResolvedConfig::default();

    for config in [global, workspace, local].iter().flatten() {
        apply_file_config(&mut result, config)?;
    }
    apply_cli_options(&mut result, cli);

    result.validate()?;
    Ok(result)
}

fn apply_file_config(
    result: &mut ResolvedConfig,
    config: &ReceiverFileConfig,
) -> Result<(), ConfigError> {
    if let Some(ref addr) = config.bind_address {
        result.bind_address = addr.trim().parse().map_err(|_| {
            ConfigError::invalid("bindAddress", format!("'{}' is not an IP address", addr))
        })?;
    }

    if let Some(port) = config.port {
        result.port = port;
    }

    if let Some(limit) = config.max_body_bytes {
        result.max_body_bytes = limit;
    }

    if let Some(capacity) = config.broadcast_capacity {
        result.broadcast_capacity = capacity;
    }

    if let Some(fallback) = config.fallback_to_ephemeral_port {
        result.fallback_to_ephemeral_port = fallback;
    }

    if let Some(cors) = config.enable_cors {
        result.enable_cors = cors;
    }

    if let Some(ref level) = config.log_level {
        result.log_level = level.to_lowercase();
    }

    Ok(())
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: CliOptions) {
    if let Some(addr) = cli.bind_address {
        result.bind_address = addr;
    }

    if let Some(port) = cli.port {
        result.port = port;
    }

    if let Some(limit) = cli.max_body_bytes {
        result.max_body_bytes = limit;
    }

    if let Some(fallback) = cli.fallback_to_ephemeral_port {
        result.fallback_to_ephemeral_port = fallback;
    }

    if let Some(cors) = cli.enable_cors {
        result.enable_cors = cors;
    }

    if let Some(level) = cli.log_level {
        result.log_level = level.to_lowercase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(port: u16) -> ReceiverFileConfig {
        ReceiverFileConfig {
            port: Some(port),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_defaults() {
        let config = merge_config(None, None, None, CliOptions::default()).unwrap();
        assert_eq!(config, ResolvedConfig::default());
    }

    #[test]
    fn test_merge_precedence() {
        let config = merge_config(Some(file(1)), Some(file(2)), None, CliOptions::default()).unwrap();
        assert_eq!(config.port, 2);

        let config =
            merge_config(Some(file(1)), Some(file(2)), Some(file(3)), CliOptions::default())
                .unwrap();
        assert_eq!(config.port, 3);

        let cli = CliOptions {
            port: Some(4),
            ..Default::default()
        };
        let config = merge_config(Some(file(1)), Some(file(2)), Some(file(3)), cli).unwrap();
        assert_eq!(config.port, 4);
    }

    #[test]
    fn test_merge_keeps_lower_sources_for_unset_fields() {
        let global = ReceiverFileConfig {
            enable_cors: Some(false),
            log_level: Some("DEBUG".to_string()),
            ..Default::default()
        };
        let config = merge_config(Some(global), Some(file(9000)), None, CliOptions::default())
            .unwrap();

        assert_eq!(config.port, 9000);
        assert!(!config.enable_cors);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_merge_bind_address() {
        let workspace = ReceiverFileConfig {
            bind_address: Some("0.0.0.0".to_string()),
            ..Default::default()
        };
        let config = merge_config(None, Some(workspace), None, CliOptions::default()).unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:4318");

        let workspace = ReceiverFileConfig {
            bind_address: Some("localhost:80".to_string()),
            ..Default::default()
        };
        let err = merge_config(None, Some(workspace), None, CliOptions::default()).unwrap_err();
        assert!(err.to_string().contains("bindAddress"));
    }

    #[test]
    fn test_merge_validates_result() {
        let local = ReceiverFileConfig {
            max_body_bytes: Some(0),
            ..Default::default()
        };
        assert!(merge_config(None, None, Some(local), CliOptions::default()).is_err());

        let local = ReceiverFileConfig {
            max_body_bytes: Some(0),
            ..Default::default()
        };
        let cli = CliOptions {
            max_body_bytes: Some(1024),
            ..Default::default()
        };
        assert_eq!(
            merge_config(None, None, Some(local), cli).unwrap().max_body_bytes,
            1024
        );
    }
}
