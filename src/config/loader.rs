// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::{ReceiverFileConfig, ResolvedConfig};

/// Workspace config file names, in search order.
pub const CONFIG_FILES: &[&str] = &[
    ".otlp-receiver.json",
    ".otlp-receiver.yaml",
    ".otlp-receiver/config.json",
];

/// Per-user overrides, not meant to be committed.
pub const LOCAL_CONFIG_FILE: &str = ".otlp-receiver.local.json";

pub const GLOBAL_CONFIG_DIR: &str = ".otlp-receiver";

pub const GLOBAL_CONFIG_FILE: &str = "config.json";

pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

pub fn get_global_config_path() -> Option<PathBuf> {
    get_global_config_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILE))
}

/// Load `~/.otlp-receiver/config.json` if it exists.
pub fn load_global_config() -> Result<Option<ReceiverFileConfig>, ConfigError> {
    let Some(path) = get_global_config_path() else {
        return Ok(None);
    };
    load_if_exists(&path)
}

/// Load the first workspace config file found in `workspace_root`.
pub fn load_workspace_config(
    workspace_root: &Path,
) -> Result<Option<ReceiverFileConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

pub fn load_local_config(workspace_root: &Path) -> Result<Option<ReceiverFileConfig>, ConfigError> {
    load_if_exists(&workspace_root.join(LOCAL_CONFIG_FILE))
}

fn load_if_exists(path: &Path) -> Result<Option<ReceiverFileConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(path).map(Some)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "yaml" | "yml"))
        .unwrap_or(false)
}

/// Load a config file; `.yaml`/`.yml` as YAML, anything else as JSON.
pub fn load_config_file(path: &Path) -> Result<ReceiverFileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(ReceiverFileConfig::default());
    }

    if is_yaml(path) {
        serde_yaml::from_str(&content).map_err(ConfigError::from)
    } else {
        serde_json::from_str(&content).map_err(ConfigError::from)
    }
}

/// Write `config` into `workspace_root`, as YAML if `filename` says so.
pub fn save_workspace_config(
    workspace_root: &Path,
    config: &ReceiverFileConfig,
    filename: Option<&str>,
) -> Result<PathBuf, ConfigError> {
    let path = workspace_root.join(filename.unwrap_or(CONFIG_FILES[0]));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = if is_yaml(&path) {
        serde_yaml::to_string(config)?
    } else {
        serde_json::to_string_pretty(config)?
    };
    std::fs::write(&path, content)?;

    Ok(path)
}

/// Write a workspace config holding `config`, or every default spelled out.
pub fn init_config(
    workspace_root: &Path,
    config: Option<ReceiverFileConfig>,
) -> Result<PathBuf, ConfigError> {
    let config = config.unwrap_or_else(|| ReceiverFileConfig::from(&ResolvedConfig::default()));
    save_workspace_config(workspace_root, &config, None)
}

/// Walk up from `start` to the first directory holding a workspace config.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| CONFIG_FILES.iter().any(|f| dir.join(f).exists()))
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_global_config_dir() {
        let dir = get_global_config_dir().unwrap();
        assert!(dir.ends_with(GLOBAL_CONFIG_DIR));
    }

    #[test]
    fn test_load_workspace_config_not_found() {
        let temp = TempDir::new().unwrap();
        assert!(load_workspace_config(temp.path()).unwrap().is_none());
        assert!(load_local_config(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_workspace_config_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".otlp-receiver.json"),
            r#"{"port": 4400, "enableCors": false}"#,
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.port, Some(4400));
        assert_eq!(config.enable_cors, Some(false));
    }

    #[test]
    fn test_load_workspace_config_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".otlp-receiver.yaml"),
            "bindAddress: 0.0.0.0\nmaxBodyBytes: 2048\n",
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.bind_address.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.max_body_bytes, Some(2048));
    }

    #[test]
    fn test_json_takes_precedence_over_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".otlp-receiver.json"), r#"{"port": 1}"#).unwrap();
        std::fs::write(temp.path().join(".otlp-receiver.yaml"), "port: 2\n").unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(config.port, Some(1));
    }

    #[test]
    fn test_load_config_file_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_file(&path), Err(ConfigError::JsonError(_))));

        let path = temp.path().join("broken.yaml");
        std::fs::write(&path, "port: [unclosed").unwrap();
        assert!(matches!(load_config_file(&path), Err(ConfigError::YamlError(_))));

        assert!(matches!(
            load_config_file(&temp.path().join("missing.json")),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_empty_file_is_empty_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".otlp-receiver.json");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(load_config_file(&path).unwrap(), ReceiverFileConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let config = ReceiverFileConfig {
            port: Some(5000),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        let path = save_workspace_config(temp.path(), &config, None).unwrap();
        assert_eq!(path.file_name().unwrap(), ".otlp-receiver.json");
        assert_eq!(load_config_file(&path).unwrap(), config);

        let path =
            save_workspace_config(temp.path(), &config, Some(".otlp-receiver.yaml")).unwrap();
        assert_eq!(load_config_file(&path).unwrap(), config);

        let path = save_workspace_config(temp.path(), &config, Some(".otlp-receiver/config.json"))
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_init_config_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let path = init_config(temp.path(), None).unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.port, Some(4318));
        assert_eq!(config.max_body_bytes, Some(10_485_760));
    }

    #[test]
    fn test_find_workspace_root() {
        let temp = TempDir::new().unwrap();
        let subdir = temp.path().join("a").join("b");
        std::fs::create_dir_all(&subdir).unwrap();
        std::fs::write(temp.path().join(".otlp-receiver.json"), "{}").unwrap();

        assert_eq!(find_workspace_root(&subdir).unwrap(), temp.path());
    }

    #[test]
    fn test_find_workspace_root_not_found() {
        let temp = TempDir::new().unwrap();
        assert!(find_workspace_root(temp.path()).is_none());
    }
}
