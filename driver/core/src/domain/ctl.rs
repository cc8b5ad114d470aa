// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Control Channel - Anti-Corruption Layer for beegfs-ctl
//!
//! Directory creation, striping and metadata lookups on a BeeGFS file
//! system happen through its administrative tool without mounting the file
//! system. This trait isolates the application layer from how that tool is
//! invoked, so services can be tested against an in-process fake.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::stripe::StripePatternConfig;
use crate::domain::volume::BeegfsVolume;

/// Control channel errors
#[derive(Debug, Error)]
pub enum CtlError {
    /// The remote path does not exist
    #[error("path {0} does not exist")]
    NotExist(String),

    /// beegfs-ctl ran and reported failure
    #[error("beegfs-ctl {args} failed with status {code:?}: {stderr}{stdout}")]
    Exec {
        args: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("beegfs-ctl {args} timed out after {timeout:?}")]
    Timeout { args: String, timeout: Duration },

    #[error("failed to run beegfs-ctl: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata of a BeeGFS entry as reported by `--getentryinfo`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryInfo {
    pub entry_type: String,
    pub entry_id: String,
    pub metadata_node: String,
    pub chunk_size: String,
    pub num_targets: String,
    pub storage_pool: String,
}

/// Operations on the remote namespace of the volume's file system
///
/// Every call addresses the file system through `vol.client_conf_path`, so
/// client files must be materialized before any method is used.
#[async_trait]
pub trait CtlExecutor: Send + Sync {
    /// Create `vol.remote_path` and any missing ancestors
    ///
    /// Existing directories are not an error.
    async fn create_directory(&self, vol: &BeegfsVolume) -> Result<(), CtlError>;

    /// Apply a stripe pattern to `vol.remote_path`; empty patterns are a no-op
    async fn set_pattern(
        &self,
        vol: &BeegfsVolume,
        pattern: &StripePatternConfig,
    ) -> Result<(), CtlError>;

    /// Look up `vol.remote_path`
    ///
    /// # Returns
    /// * `Err(CtlError::NotExist)` - if the directory is absent
    async fn stat_directory(&self, vol: &BeegfsVolume) -> Result<EntryInfo, CtlError>;
}
