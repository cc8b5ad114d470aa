// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Node Publisher
//!
//! Makes a volume available to a workload on this node. BeeGFS is mounted
//! once per (volume, target) pair under a private anchor directory and the
//! volume directory is bind-mounted onto the target path requested by the
//! container orchestrator. Unpublishing reverses both mounts.

use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::scaffold::{self, ScaffoldGuard, Teardown};
use crate::domain::capability::{check_capabilities, VolumeCapability};
use crate::domain::mount::Mounter;
use crate::domain::plugin_config::PluginConfig;
use crate::domain::volume::{BeegfsVolume, VolumeId};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

pub struct NodeService {
    node_id: String,
    mounter: Arc<dyn Mounter>,
    plugin_config: Arc<PluginConfig>,
    client_conf_template_path: PathBuf,
    data_dir: PathBuf,
}

impl NodeService {
    pub fn new(
        node_id: impl Into<String>,
        mounter: Arc<dyn Mounter>,
        plugin_config: Arc<PluginConfig>,
        client_conf_template_path: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            mounter,
            plugin_config,
            client_conf_template_path: client_conf_template_path.into(),
            data_dir: data_dir.into(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Descriptor whose anchor is unique to `target_path`
    ///
    /// Two workloads on the same node may publish the same volume; each gets
    /// its own BeeGFS mount so unpublishing one never disturbs the other.
    fn volume(&self, volume_id: &str, target_path: &Path) -> Result<BeegfsVolume, NodeError> {
        let id = VolumeId::parse(volume_id)
            .with_context(|| format!("failed to decode volume ID {}", volume_id))?;

        let digest = hex::encode(Sha256::digest(target_path.as_os_str().as_encoded_bytes()));
        let anchor = self
            .data_dir
            .join(format!("{}-{}", id.sanitize(), &digest[..16]));

        let config = self.plugin_config.config_for(id.sys_mgmtd_host());
        Ok(BeegfsVolume::new(anchor, id, config))
    }

    pub async fn publish_volume(
        &self,
        volume_id: &str,
        target_path: &Path,
        capability: Option<&VolumeCapability>,
        readonly: bool,
    ) -> Result<(), NodeError> {
        if volume_id.is_empty() {
            return Err(NodeError::InvalidArgument("Volume ID not provided".into()));
        }
        if target_path.as_os_str().is_empty() {
            return Err(NodeError::InvalidArgument("Target path not provided".into()));
        }
        let Some(capability) = capability else {
            return Err(NodeError::InvalidArgument("Volume capability not provided".into()));
        };
        if let Err(rejection) = check_capabilities(std::slice::from_ref(capability)) {
            return Err(NodeError::InvalidArgument(format!(
                "Volume capability not supported: {}",
                rejection
            )));
        }

        let vol = self.volume(volume_id, target_path)?;

        if self
            .mounter
            .is_mount_point(target_path)
            .await
            .context("failed to inspect target path")?
        {
            debug!(volume_id = %vol.volume_id, target = %target_path.display(), "Volume already published");
            return Ok(());
        }

        let read_only = readonly || capability.access_mode.is_some_and(|m| m.is_read_only());
        info!(
            volume_id = %vol.volume_id,
            target = %target_path.display(),
            read_only,
            "Publishing volume"
        );

        let guard = ScaffoldGuard::new(self.mounter.clone(), vol.clone(), Teardown::UnmountAndCleanUp);
        match self.bind_volume(&vol, target_path, capability, read_only).await {
            Ok(()) => {
                guard.disarm();
                info!(volume_id = %vol.volume_id, target = %target_path.display(), "Volume published");
                Ok(())
            }
            Err(e) => {
                guard.release().await;
                Err(e.into())
            }
        }
    }

    async fn bind_volume(
        &self,
        vol: &BeegfsVolume,
        target_path: &Path,
        capability: &VolumeCapability,
        read_only: bool,
    ) -> anyhow::Result<()> {
        scaffold::materialize(vol, &self.client_conf_template_path).await?;
        scaffold::mount_if_necessary(self.mounter.as_ref(), vol).await?;

        tokio::fs::create_dir_all(target_path)
            .await
            .with_context(|| format!("failed to create target path {:?}", target_path))?;

        let mut options = vec!["bind".to_string()];
        if read_only {
            options.push("ro".to_string());
        }
        options.extend(capability.mount_flags().iter().cloned());

        let source = vol.mounted_volume_path.display().to_string();
        self.mounter
            .mount(&source, target_path, "", &options)
            .await
            .with_context(|| format!("failed to bind mount {} at {:?}", source, target_path))?;

        Ok(())
    }

    /// Undo [`publish_volume`](Self::publish_volume); safe to repeat
    pub async fn unpublish_volume(&self, volume_id: &str, target_path: &Path) -> Result<(), NodeError> {
        if volume_id.is_empty() {
            return Err(NodeError::InvalidArgument("Volume ID not provided".into()));
        }
        if target_path.as_os_str().is_empty() {
            return Err(NodeError::InvalidArgument("Target path not provided".into()));
        }
        let vol = self.volume(volume_id, target_path)?;

        info!(volume_id = %vol.volume_id, target = %target_path.display(), "Unpublishing volume");

        if self.mounter.is_mount_point(target_path).await.context("failed to inspect target path")? {
            self.mounter
                .unmount(target_path)
                .await
                .with_context(|| format!("failed to unmount {:?}", target_path))?;
        }

        match tokio::fs::remove_dir(target_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("failed to remove target path {:?}", target_path))
                    .into())
            }
        }

        scaffold::unmount_and_clean_up_if_necessary(self.mounter.as_ref(), &vol, true).await?;

        info!(volume_id = %vol.volume_id, target = %target_path.display(), "Volume unpublished");
        Ok(())
    }
}
