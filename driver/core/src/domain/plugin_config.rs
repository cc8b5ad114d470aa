// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Plugin Configuration
//!
//! Client-side network settings for the BeeGFS file systems the driver
//! talks to. Loaded once from YAML at startup and shared read-only by every
//! service; per-volume settings are resolved with [`PluginConfig::config_for`].
//!
//! # Example
//!
//! ```yaml
//! config:
//!   connInterfaces: [ib0, eth0]
//!   beegfsClientConf:
//!     connMgmtdPortTCP: "9008"
//! fileSystemSpecificConfigs:
//!   - sysMgmtdHost: 10.0.0.1
//!     config:
//!       connInterfaces: [ib1]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// `beegfs-client.conf` keys the driver writes itself
pub const DRIVER_OWNED_CLIENT_CONF_KEYS: &[&str] = &[
    "sysMgmtdHost",
    "connInterfacesFile",
    "connNetFilterFile",
    "connTcpOnlyFilterFile",
];

/// Default on-disk location of the plugin configuration
pub const DEFAULT_PLUGIN_CONFIG_PATH: &str = "/etc/beegfs-csi/csi-beegfs-config.yaml";

#[derive(Debug, Error)]
pub enum PluginConfigError {
    #[error("failed to read plugin configuration {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse plugin configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("fileSystemSpecificConfigs entry {0} has an empty sysMgmtdHost")]
    EmptyHost(usize),

    #[error("sysMgmtdHost {0} appears in more than one fileSystemSpecificConfigs entry")]
    DuplicateHost(String),

    #[error("beegfsClientConf key {key} is managed by the driver and cannot be overridden ({scope})")]
    ReservedClientConfKey { key: String, scope: String },
}

/// Client network settings for one file system (or the defaults)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemConfig {
    /// Network interfaces the client may use, in order of preference
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conn_interfaces: Vec<String>,

    /// Subnets the client may use for any connection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conn_net_filter: Vec<String>,

    /// Subnets on which only TCP is used
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conn_tcp_only_filter: Vec<String>,

    /// Raw `beegfs-client.conf` overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub beegfs_client_conf: BTreeMap<String, String>,
}

impl FileSystemConfig {
    /// Overlay `other` onto `self`: non-empty lists replace, client conf keys merge
    fn overlay(&mut self, other: &FileSystemConfig) {
        if !other.conn_interfaces.is_empty() {
            self.conn_interfaces = other.conn_interfaces.clone();
        }
        if !other.conn_net_filter.is_empty() {
            self.conn_net_filter = other.conn_net_filter.clone();
        }
        if !other.conn_tcp_only_filter.is_empty() {
            self.conn_tcp_only_filter = other.conn_tcp_only_filter.clone();
        }
        for (key, value) in &other.beegfs_client_conf {
            self.beegfs_client_conf.insert(key.clone(), value.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemSpecificConfig {
    pub sys_mgmtd_host: String,
    #[serde(default)]
    pub config: FileSystemConfig,
}

/// Top-level plugin configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// Defaults applied to every file system
    #[serde(default)]
    pub config: FileSystemConfig,

    /// Per-file-system overrides keyed by management host
    #[serde(default)]
    pub file_system_specific_configs: Vec<FileSystemSpecificConfig>,
}

impl PluginConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, PluginConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PluginConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PluginConfigError> {
        // An empty document is a valid, empty configuration.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load the configuration at `path`, or defaults when no path is given
    ///
    /// An explicit path that does not exist or does not parse is an error.
    /// Without one, [`DEFAULT_PLUGIN_CONFIG_PATH`] is tried and an absent
    /// file yields an empty configuration.
    pub fn load_or_default(path: Option<PathBuf>) -> Result<Self, PluginConfigError> {
        if let Some(path) = path {
            tracing::info!("Loading plugin configuration from explicit path: {:?}", path);
            return Self::from_yaml_file(&path);
        }

        let default_path = PathBuf::from(DEFAULT_PLUGIN_CONFIG_PATH);
        if default_path.exists() {
            tracing::info!("Loading plugin configuration from {:?}", default_path);
            Self::from_yaml_file(default_path)
        } else {
            tracing::warn!("No plugin configuration found. Using empty defaults.");
            Ok(Self::default())
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), PluginConfigError> {
        check_reserved_keys(&self.config, "config")?;

        let mut seen = HashSet::new();
        for (index, entry) in self.file_system_specific_configs.iter().enumerate() {
            if entry.sys_mgmtd_host.is_empty() {
                return Err(PluginConfigError::EmptyHost(index));
            }
            if !seen.insert(entry.sys_mgmtd_host.as_str()) {
                return Err(PluginConfigError::DuplicateHost(entry.sys_mgmtd_host.clone()));
            }
            check_reserved_keys(
                &entry.config,
                &format!("fileSystemSpecificConfigs[{}]", entry.sys_mgmtd_host),
            )?;
        }

        Ok(())
    }

    /// Effective settings for the file system managed by `sys_mgmtd_host`
    pub fn config_for(&self, sys_mgmtd_host: &str) -> FileSystemConfig {
        let mut resolved = self.config.clone();
        if let Some(specific) = self
            .file_system_specific_configs
            .iter()
            .find(|entry| entry.sys_mgmtd_host == sys_mgmtd_host)
        {
            resolved.overlay(&specific.config);
        }
        resolved
    }
}

fn check_reserved_keys(config: &FileSystemConfig, scope: &str) -> Result<(), PluginConfigError> {
    for key in config.beegfs_client_conf.keys() {
        if DRIVER_OWNED_CLIENT_CONF_KEYS.contains(&key.as_str()) {
            return Err(PluginConfigError::ReservedClientConfKey {
                key: key.clone(),
                scope: scope.to_string(),
            });
        }
    }
    Ok(())
}
