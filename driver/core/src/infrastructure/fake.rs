// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process BeeGFS stand-in
//!
//! [`FakeBeegfs`] implements both [`CtlExecutor`] and [`Mounter`] on top of a
//! local directory that plays the role of the remote BeeGFS namespace.
//! "Mounting" replaces the mount point with a symlink to that directory, so
//! code that walks `mounted_volume_path` operates on the fake remote tree.
//! Used by unit and integration tests; no root privileges or BeeGFS install
//! required.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::domain::ctl::{CtlError, CtlExecutor, EntryInfo};
use crate::domain::mount::{MountError, Mounter};
use crate::domain::stripe::StripePatternConfig;
use crate::domain::volume::BeegfsVolume;

/// Operations whose calls are counted and which can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    CreateDirectory,
    SetPattern,
    StatDirectory,
    Mount,
    Unmount,
}

/// A mount performed through the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub source: String,
    pub target: PathBuf,
    pub fs_type: String,
    pub options: Vec<String>,
}

pub struct FakeBeegfs {
    remote_root: PathBuf,
    mounts: Mutex<HashMap<PathBuf, MountRecord>>,
    patterns: Mutex<HashMap<String, StripePatternConfig>>,
    calls: Mutex<HashMap<FakeOp, usize>>,
    failing: Mutex<HashSet<FakeOp>>,
}

impl FakeBeegfs {
    /// Create a fake whose remote namespace lives below `remote_root`
    pub fn new(remote_root: impl Into<PathBuf>) -> Self {
        Self {
            remote_root: remote_root.into(),
            mounts: Mutex::new(HashMap::new()),
            patterns: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Local path backing a remote BeeGFS path
    pub fn remote_path(&self, remote: &str) -> PathBuf {
        self.remote_root.join(remote.trim_start_matches('/'))
    }

    /// Make every subsequent call of `op` fail
    pub fn fail(&self, op: FakeOp) {
        lock(&self.failing).insert(op);
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    pub fn calls(&self, op: FakeOp) -> usize {
        lock(&self.calls).get(&op).copied().unwrap_or(0)
    }

    /// Stripe pattern last applied to a remote path
    pub fn pattern(&self, remote: &str) -> Option<StripePatternConfig> {
        lock(&self.patterns).get(remote).cloned()
    }

    /// Mounts currently active, in no particular order
    pub fn active_mounts(&self) -> Vec<MountRecord> {
        lock(&self.mounts).values().cloned().collect()
    }

    fn enter(&self, op: FakeOp) -> bool {
        *lock(&self.calls).entry(op).or_insert(0) += 1;
        lock(&self.failing).contains(&op)
    }

    fn injected_ctl_error(args: &str) -> CtlError {
        CtlError::Exec {
            args: args.to_string(),
            code: Some(1),
            stdout: String::new(),
            stderr: "injected failure".to_string(),
        }
    }

    async fn require_client_conf(vol: &BeegfsVolume) -> Result<(), CtlError> {
        if tokio::fs::metadata(&vol.client_conf_path).await.is_err() {
            return Err(CtlError::Exec {
                args: format!("--cfgFile={}", vol.client_conf_path.display()),
                code: Some(1),
                stdout: String::new(),
                stderr: "client configuration file not found".to_string(),
            });
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl CtlExecutor for FakeBeegfs {
    async fn create_directory(&self, vol: &BeegfsVolume) -> Result<(), CtlError> {
        if self.enter(FakeOp::CreateDirectory) {
            return Err(Self::injected_ctl_error("--createdir"));
        }
        Self::require_client_conf(vol).await?;
        tokio::fs::create_dir_all(self.remote_path(&vol.remote_path)).await?;
        Ok(())
    }

    async fn set_pattern(
        &self,
        vol: &BeegfsVolume,
        pattern: &StripePatternConfig,
    ) -> Result<(), CtlError> {
        if self.enter(FakeOp::SetPattern) {
            return Err(Self::injected_ctl_error("--setpattern"));
        }
        if pattern.is_empty() {
            return Ok(());
        }
        Self::require_client_conf(vol).await?;
        if !self.remote_path(&vol.remote_path).is_dir() {
            return Err(CtlError::NotExist(vol.remote_path.clone()));
        }
        lock(&self.patterns).insert(vol.remote_path.clone(), pattern.clone());
        Ok(())
    }

    async fn stat_directory(&self, vol: &BeegfsVolume) -> Result<EntryInfo, CtlError> {
        if self.enter(FakeOp::StatDirectory) {
            return Err(Self::injected_ctl_error("--getentryinfo"));
        }
        Self::require_client_conf(vol).await?;

        match tokio::fs::metadata(self.remote_path(&vol.remote_path)).await {
            Ok(meta) => {
                let pattern = self.pattern(&vol.remote_path).unwrap_or_default();
                Ok(EntryInfo {
                    entry_type: if meta.is_dir() { "directory" } else { "file" }.to_string(),
                    entry_id: vol.remote_path.clone(),
                    metadata_node: "fake".to_string(),
                    chunk_size: pattern.chunk_size.unwrap_or_default(),
                    num_targets: pattern.num_targets.unwrap_or_default(),
                    storage_pool: pattern.storage_pool_id.unwrap_or_default(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CtlError::NotExist(vol.remote_path.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Mounter for FakeBeegfs {
    async fn is_mount_point(&self, path: &Path) -> Result<bool, MountError> {
        Ok(lock(&self.mounts).contains_key(path))
    }

    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError> {
        if self.enter(FakeOp::Mount) {
            return Err(MountError::Command {
                command: format!("mount {}", target.display()),
                code: Some(32),
                stderr: "injected failure".to_string(),
            });
        }
        if lock(&self.mounts).contains_key(target) {
            return Err(MountError::Busy {
                path: target.display().to_string(),
            });
        }

        // Bind mounts expose an existing local path; file system mounts expose the remote root.
        let backing = if options.iter().any(|o| o == "bind") {
            tokio::fs::canonicalize(source).await?
        } else {
            tokio::fs::create_dir_all(&self.remote_root).await?;
            tokio::fs::canonicalize(&self.remote_root).await?
        };

        tokio::fs::remove_dir(target).await?;
        tokio::fs::symlink(&backing, target).await?;

        lock(&self.mounts).insert(
            target.to_path_buf(),
            MountRecord {
                source: source.to_string(),
                target: target.to_path_buf(),
                fs_type: fs_type.to_string(),
                options: options.to_vec(),
            },
        );
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> Result<(), MountError> {
        if self.enter(FakeOp::Unmount) {
            return Err(MountError::Command {
                command: format!("umount {}", target.display()),
                code: Some(32),
                stderr: "injected failure".to_string(),
            });
        }
        if lock(&self.mounts).remove(target).is_none() {
            return Err(MountError::Command {
                command: format!("umount {}", target.display()),
                code: Some(32),
                stderr: "not mounted".to_string(),
            });
        }

        tokio::fs::remove_file(target).await?;
        tokio::fs::create_dir(target).await?;
        Ok(())
    }
}
