// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mounter
//!
//! Seam over the host's mount table. Production code mounts BeeGFS through
//! the kernel client; tests substitute a fake that never touches it.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MountError {
    #[error("{command} failed with status {code:?}: {stderr}")]
    Command {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{path} is still mounted")]
    Busy { path: String },

    #[error("mount I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Mounter: Send + Sync {
    /// Whether `path` is the root of a mount
    ///
    /// A path that does not exist is not a mount point.
    async fn is_mount_point(&self, path: &Path) -> Result<bool, MountError>;

    /// Mount `source` of type `fs_type` at `target` with `options`
    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError>;

    async fn unmount(&self, target: &Path) -> Result<(), MountError>;
}
