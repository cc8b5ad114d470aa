// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Lifecycle Controller
//!
//! Creates, deletes and validates BeeGFS directory volumes. Each call
//! rebuilds the volume descriptor from its inputs, materializes a transient
//! anchor directory with a client configuration, talks to the file system
//! through the control channel (create, validate) or a temporary mount
//! (delete), and tears the anchor down again before returning.
//!
//! The service holds no per-volume state. Repeated calls with the same
//! inputs converge on the same outcome.

use anyhow::Context;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::scaffold::{self, ScaffoldGuard, Teardown};
use crate::domain::capability::{check_capabilities, VolumeCapability};
use crate::domain::ctl::{CtlError, CtlExecutor};
use crate::domain::mount::Mounter;
use crate::domain::plugin_config::PluginConfig;
use crate::domain::stripe::StripePatternConfig;
use crate::domain::volume::{clean_remote_path, join_remote_path, BeegfsVolume, VolumeId};

/// CreateVolume parameter naming the BeeGFS management host
pub const SYS_MGMTD_HOST_KEY: &str = "sysMgmtdHost";

/// CreateVolume parameter naming the directory new volumes are created in
pub const VOL_DIR_BASE_PATH_KEY: &str = "volDirBasePath";

/// Errors returned to the RPC layer, one variant per status kind
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Controller features advertised to the container orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCapability {
    CreateDeleteVolume,
}

pub const CONTROLLER_CAPABILITIES: &[ControllerCapability] =
    &[ControllerCapability::CreateDeleteVolume];

/// Result of ValidateVolumeCapabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityValidation {
    Confirmed,
    Rejected(String),
}

pub struct ControllerService {
    ctl: Arc<dyn CtlExecutor>,
    mounter: Arc<dyn Mounter>,
    plugin_config: Arc<PluginConfig>,
    client_conf_template_path: PathBuf,
    data_dir: PathBuf,
}

impl ControllerService {
    /// # Arguments
    /// * `ctl` - Control channel used for directory creation and lookups
    /// * `mounter` - Mount table used by DeleteVolume
    /// * `plugin_config` - Shared, read-only client network configuration
    /// * `client_conf_template_path` - Stock `beegfs-client.conf` to start from
    /// * `data_dir` - Local root under which anchor directories are created
    pub fn new(
        ctl: Arc<dyn CtlExecutor>,
        mounter: Arc<dyn Mounter>,
        plugin_config: Arc<PluginConfig>,
        client_conf_template_path: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ctl,
            mounter,
            plugin_config,
            client_conf_template_path: client_conf_template_path.into(),
            data_dir: data_dir.into(),
        }
    }

    fn volume(&self, volume_id: VolumeId) -> BeegfsVolume {
        let config = self.plugin_config.config_for(volume_id.sys_mgmtd_host());
        BeegfsVolume::new(volume_id.anchor_dir(&self.data_dir), volume_id, config)
    }

    fn decode(&self, volume_id: &str) -> Result<BeegfsVolume, ControllerError> {
        let id = VolumeId::parse(volume_id)
            .with_context(|| format!("failed to decode volume ID {}", volume_id))?;
        Ok(self.volume(id))
    }

    /// Create a volume directory and return its ID
    ///
    /// All validation happens before any local or remote side effect.
    pub async fn create_volume(
        &self,
        name: &str,
        capabilities: &[VolumeCapability],
        parameters: &HashMap<String, String>,
    ) -> Result<VolumeId, ControllerError> {
        if name.is_empty() {
            return Err(ControllerError::InvalidArgument("Volume name not provided".into()));
        }
        if name.contains('/') || name == "." || name == ".." {
            return Err(ControllerError::InvalidArgument(format!(
                "Volume name {:?} is not a valid directory name",
                name
            )));
        }
        if capabilities.is_empty() {
            return Err(ControllerError::InvalidArgument("Volume capabilities not provided".into()));
        }
        if let Err(rejection) = check_capabilities(capabilities) {
            return Err(ControllerError::InvalidArgument(format!(
                "Volume capabilities not supported: {}",
                rejection
            )));
        }
        if parameters.is_empty() {
            return Err(ControllerError::InvalidArgument("Request parameters not provided".into()));
        }
        let sys_mgmtd_host = required_parameter(parameters, SYS_MGMTD_HOST_KEY)?;
        if sys_mgmtd_host.is_empty() {
            return Err(ControllerError::InvalidArgument(format!("{} not provided", SYS_MGMTD_HOST_KEY)));
        }
        // An empty base path is rooted at "/".
        let base_path = clean_remote_path(required_parameter(parameters, VOL_DIR_BASE_PATH_KEY)?);

        let pattern = StripePatternConfig::from_parameters(parameters)
            .map_err(|e| ControllerError::InvalidArgument(e.to_string()))?;

        let remote_path = join_remote_path(&base_path, name);
        let volume_id = VolumeId::encode(sys_mgmtd_host, &remote_path)
            .map_err(|e| ControllerError::InvalidArgument(format!("CreateVolume parameter invalid: {}", e)))?;
        let vol = self.volume(volume_id);

        info!(
            volume_id = %vol.volume_id,
            name,
            ?pattern,
            "Creating volume"
        );

        let guard = ScaffoldGuard::new(self.mounter.clone(), vol.clone(), Teardown::CleanUp);
        let result = self.create_remote_directory(&vol, &pattern).await;
        guard.release().await;
        result?;

        info!(volume_id = %vol.volume_id, "Volume created");
        Ok(vol.volume_id)
    }

    async fn create_remote_directory(
        &self,
        vol: &BeegfsVolume,
        pattern: &StripePatternConfig,
    ) -> anyhow::Result<()> {
        scaffold::materialize(vol, &self.client_conf_template_path).await?;

        self.ctl
            .create_directory(vol)
            .await
            .with_context(|| format!("failed to create directory {} on {}", vol.remote_path, vol.sys_mgmtd_host))?;

        self.ctl
            .set_pattern(vol, pattern)
            .await
            .with_context(|| format!("failed to set stripe pattern on {}", vol.remote_path))?;

        Ok(())
    }

    /// Delete a volume directory and everything in it
    ///
    /// Deleting a volume that no longer exists succeeds.
    pub async fn delete_volume(&self, volume_id: &str) -> Result<(), ControllerError> {
        if volume_id.is_empty() {
            return Err(ControllerError::InvalidArgument("Volume ID not provided".into()));
        }
        let vol = self.decode(volume_id)?;

        info!(volume_id = %vol.volume_id, "Deleting volume");

        let guard = ScaffoldGuard::new(self.mounter.clone(), vol.clone(), Teardown::UnmountAndCleanUp);
        let result = self.delete_remote_directory(&vol).await;
        guard.release().await;
        result?;

        info!(volume_id = %vol.volume_id, "Volume deleted");
        Ok(())
    }

    async fn delete_remote_directory(&self, vol: &BeegfsVolume) -> anyhow::Result<()> {
        scaffold::materialize(vol, &self.client_conf_template_path).await?;
        scaffold::mount_if_necessary(self.mounter.as_ref(), vol).await?;

        match tokio::fs::remove_dir_all(&vol.mounted_volume_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %vol.mounted_volume_path.display(), "Volume directory already gone");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| {
                format!("failed to remove {:?}", vol.mounted_volume_path)
            }),
        }
    }

    /// Check that a volume exists and supports the requested capabilities
    ///
    /// Unsupported capabilities are reported in the result, not as an error.
    pub async fn validate_volume_capabilities(
        &self,
        volume_id: &str,
        capabilities: &[VolumeCapability],
    ) -> Result<CapabilityValidation, ControllerError> {
        if volume_id.is_empty() {
            return Err(ControllerError::InvalidArgument("Volume ID not provided".into()));
        }
        if capabilities.is_empty() {
            return Err(ControllerError::InvalidArgument("Volume capabilities not provided".into()));
        }
        let vol = self.decode(volume_id)?;

        let guard = ScaffoldGuard::new(self.mounter.clone(), vol.clone(), Teardown::CleanUp);
        let result = self.stat_remote_directory(&vol).await;
        guard.release().await;
        result?;

        match check_capabilities(capabilities) {
            Ok(()) => Ok(CapabilityValidation::Confirmed),
            Err(rejection) => {
                debug!(volume_id = %vol.volume_id, reason = %rejection, "Capabilities not confirmed");
                Ok(CapabilityValidation::Rejected(rejection.to_string()))
            }
        }
    }

    async fn stat_remote_directory(&self, vol: &BeegfsVolume) -> Result<(), ControllerError> {
        scaffold::materialize(vol, &self.client_conf_template_path).await?;

        match self.ctl.stat_directory(vol).await {
            Ok(info) => {
                debug!(volume_id = %vol.volume_id, entry_type = %info.entry_type, "Volume exists");
                Ok(())
            }
            Err(CtlError::NotExist(path)) => Err(ControllerError::NotFound(format!(
                "Volume {} not found: directory {} does not exist",
                vol.volume_id, path
            ))),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("failed to stat directory {}", vol.remote_path))
                .into()),
        }
    }

    pub fn capabilities(&self) -> &'static [ControllerCapability] {
        CONTROLLER_CAPABILITIES
    }
}

fn required_parameter<'a>(
    parameters: &'a HashMap<String, String>,
    key: &str,
) -> Result<&'a str, ControllerError> {
    parameters
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ControllerError::InvalidArgument(format!("{} not provided", key)))
}
