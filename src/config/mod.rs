// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Receiver configuration.
//!
//! Sources, merged with precedence CLI > local > workspace > global > defaults:
//! - Global config: ~/.otlp-receiver/config.json
//! - Workspace config: .otlp-receiver.json, .otlp-receiver.yaml or .otlp-receiver/config.json
//! - Local config: .otlp-receiver.local.json
//! - CLI options

mod loader;
mod merger;
mod types;

pub use loader::{
    find_workspace_root, get_global_config_dir, get_global_config_path, init_config,
    load_config_file, load_global_config, load_local_config, load_workspace_config,
    save_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE, LOCAL_CONFIG_FILE,
};
pub use merger::{merge_config, CliOptions};
pub use types::{
    ReceiverFileConfig, ResolvedConfig, DEFAULT_BROADCAST_CAPACITY, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT,
};

use std::path::Path;

use crate::error::ConfigError;

/// Load, merge and validate every configuration source for a workspace.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let local = load_local_config(workspace_root)?;

    merge_config(global, workspace, local, cli_options)
}
