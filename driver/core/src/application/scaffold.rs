// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Volume Scaffolding
//!
//! Every RPC that touches a BeeGFS file system first builds a transient
//! anchor directory holding the client configuration and, when needed, a
//! mount point. This module creates and removes that scaffolding, and
//! provides [`ScaffoldGuard`] which guarantees the removal runs even when
//! the RPC returns early or its future is dropped.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Mount/unmount and anchor lifecycle shared by controller and node

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::mount::{MountError, Mounter};
use crate::domain::volume::BeegfsVolume;
use crate::infrastructure::client_conf::{client_file_paths, write_client_files};

/// BeeGFS file system type and pseudo-device for kernel client mounts
pub const BEEGFS_FS_TYPE: &str = "beegfs";
pub const BEEGFS_MOUNT_SOURCE: &str = "beegfs_nodev";

/// Create the anchor directory and write the client configuration into it
pub async fn materialize(vol: &BeegfsVolume, template_path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(&vol.anchor_dir)
        .await
        .with_context(|| format!("failed to create anchor directory {:?}", vol.anchor_dir))?;

    write_client_files(vol, template_path)
        .await
        .with_context(|| format!("failed to write client configuration for {}", vol.volume_id))?;

    Ok(())
}

/// Mount the volume's file system at `vol.mount_path` unless already mounted
pub async fn mount_if_necessary(mounter: &dyn Mounter, vol: &BeegfsVolume) -> Result<()> {
    tokio::fs::create_dir_all(&vol.mount_path)
        .await
        .with_context(|| format!("failed to create mount point {:?}", vol.mount_path))?;

    if mounter.is_mount_point(&vol.mount_path).await? {
        debug!(mount_path = %vol.mount_path.display(), "BeeGFS already mounted");
        return Ok(());
    }

    let options = vec![
        format!("cfgFile={}", vol.client_conf_path.display()),
        "_netdev".to_string(),
    ];
    mounter
        .mount(BEEGFS_MOUNT_SOURCE, &vol.mount_path, BEEGFS_FS_TYPE, &options)
        .await
        .with_context(|| {
            format!(
                "failed to mount BeeGFS {} at {:?}",
                vol.sys_mgmtd_host, vol.mount_path
            )
        })?;

    debug!(
        sys_mgmtd_host = %vol.sys_mgmtd_host,
        mount_path = %vol.mount_path.display(),
        "Mounted BeeGFS"
    );
    Ok(())
}

/// Unmount `vol.mount_path` if mounted, then remove the scaffolding
pub async fn unmount_and_clean_up_if_necessary(
    mounter: &dyn Mounter,
    vol: &BeegfsVolume,
    remove_anchor: bool,
) -> Result<()> {
    if mounter.is_mount_point(&vol.mount_path).await? {
        mounter
            .unmount(&vol.mount_path)
            .await
            .with_context(|| format!("failed to unmount {:?}", vol.mount_path))?;
        debug!(mount_path = %vol.mount_path.display(), "Unmounted BeeGFS");
    }
    clean_up_if_necessary(mounter, vol, remove_anchor).await
}

/// Remove client files, the mount point and optionally the anchor directory
///
/// Refuses to touch anything while `vol.mount_path` is still a mount point.
/// Paths that are already gone are not errors.
pub async fn clean_up_if_necessary(
    mounter: &dyn Mounter,
    vol: &BeegfsVolume,
    remove_anchor: bool,
) -> Result<()> {
    if mounter.is_mount_point(&vol.mount_path).await? {
        return Err(MountError::Busy {
            path: vol.mount_path.display().to_string(),
        })
        .context("refusing to clean up a mounted volume");
    }

    for path in client_file_paths(vol) {
        remove_if_exists(&path, tokio::fs::remove_file(&path).await)?;
    }
    remove_if_exists(&vol.mount_path, tokio::fs::remove_dir(&vol.mount_path).await)?;
    if remove_anchor {
        remove_if_exists(&vol.anchor_dir, tokio::fs::remove_dir(&vol.anchor_dir).await)?;
    }

    Ok(())
}

fn remove_if_exists(path: &Path, result: std::io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {:?}", path)),
    }
}

// ============================================================================
// Guard
// ============================================================================

/// What a [`ScaffoldGuard`] tears down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Remove client files and anchor; never unmount
    CleanUp,
    /// Unmount if mounted, then remove client files and anchor
    UnmountAndCleanUp,
}

struct PendingTeardown {
    mounter: Arc<dyn Mounter>,
    vol: BeegfsVolume,
    teardown: Teardown,
}

impl PendingTeardown {
    async fn run(self) {
        let result = match self.teardown {
            Teardown::CleanUp => clean_up_if_necessary(self.mounter.as_ref(), &self.vol, true).await,
            Teardown::UnmountAndCleanUp => {
                unmount_and_clean_up_if_necessary(self.mounter.as_ref(), &self.vol, true).await
            }
        };

        if let Err(e) = result {
            warn!(
                volume_id = %self.vol.volume_id,
                anchor = %self.vol.anchor_dir.display(),
                error = %format!("{:#}", e),
                "Failed to tear down volume scaffolding"
            );
        }
    }
}

/// Scope guard removing a volume's local scaffolding
///
/// Call [`release`](Self::release) on every normal exit path. If the guard
/// is dropped without release (for example because the RPC was cancelled),
/// the same teardown is spawned onto the current Tokio runtime. Teardown
/// failures are logged, never returned.
#[must_use = "scaffolding is torn down when the guard is released or dropped"]
pub struct ScaffoldGuard {
    pending: Option<PendingTeardown>,
}

impl ScaffoldGuard {
    pub fn new(mounter: Arc<dyn Mounter>, vol: BeegfsVolume, teardown: Teardown) -> Self {
        Self {
            pending: Some(PendingTeardown {
                mounter,
                vol,
                teardown,
            }),
        }
    }

    /// Run the teardown now
    pub async fn release(mut self) {
        if let Some(pending) = self.pending.take() {
            pending.run().await;
        }
    }

    /// Keep the scaffolding in place
    pub fn disarm(mut self) {
        self.pending = None;
    }
}

impl Drop for ScaffoldGuard {
    fn drop(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(volume_id = %pending.vol.volume_id, "Spawning teardown for abandoned scaffolding");
                handle.spawn(pending.run());
            }
            Err(_) => {
                warn!(
                    volume_id = %pending.vol.volume_id,
                    anchor = %pending.vol.anchor_dir.display(),
                    "No runtime available; volume scaffolding left behind"
                );
            }
        }
    }
}
