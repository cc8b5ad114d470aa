// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! beegfs-ctl Executor
//!
//! Production [`CtlExecutor`] that shells out to `beegfs-ctl` in
//! `--unmounted` mode, addressing the file system through the volume's
//! materialized `beegfs-client.conf`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements the control channel over `tokio::process`

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::ctl::{CtlError, CtlExecutor, EntryInfo};
use crate::domain::stripe::StripePatternConfig;
use crate::domain::volume::BeegfsVolume;

pub const DEFAULT_CTL_PATH: &str = "beegfs-ctl";
pub const DEFAULT_CTL_TIMEOUT: Duration = Duration::from_secs(30);

const ENTRY_EXISTS: &str = "Entry exists already";
const PATH_DOES_NOT_EXIST: &str = "Path does not exist";

pub struct BeegfsCtlExecutor {
    ctl_path: PathBuf,
    timeout: Duration,
}

impl BeegfsCtlExecutor {
    pub fn new(ctl_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ctl_path: ctl_path.into(),
            timeout,
        }
    }

    /// Run beegfs-ctl against the volume's file system and return stdout
    async fn run(&self, vol: &BeegfsVolume, args: &[String]) -> Result<String, CtlError> {
        let mut full_args = vec![
            format!("--cfgFile={}", vol.client_conf_path.display()),
            "--unmounted".to_string(),
        ];
        full_args.extend_from_slice(args);
        let rendered = full_args.join(" ");

        debug!(command = %self.ctl_path.display(), args = %rendered, "Running beegfs-ctl");

        let mut cmd = Command::new(&self.ctl_path);
        cmd.args(&full_args).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(CtlError::Timeout {
                    args: rendered,
                    timeout: self.timeout,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            return Ok(stdout);
        }

        if stdout.contains(PATH_DOES_NOT_EXIST) || stderr.contains(PATH_DOES_NOT_EXIST) {
            return Err(CtlError::NotExist(vol.remote_path.clone()));
        }

        Err(CtlError::Exec {
            args: rendered,
            code: output.status.code(),
            stdout,
            stderr,
        })
    }
}

impl Default for BeegfsCtlExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_CTL_PATH, DEFAULT_CTL_TIMEOUT)
    }
}

#[async_trait]
impl CtlExecutor for BeegfsCtlExecutor {
    async fn create_directory(&self, vol: &BeegfsVolume) -> Result<(), CtlError> {
        for dir in remote_ancestors(&vol.remote_path) {
            let args = vec!["--createdir".to_string(), dir.clone()];
            match self.run(vol, &args).await {
                Ok(_) => debug!(path = %dir, "Created BeeGFS directory"),
                Err(CtlError::Exec { stdout, stderr, .. })
                    if stdout.contains(ENTRY_EXISTS) || stderr.contains(ENTRY_EXISTS) =>
                {
                    debug!(path = %dir, "BeeGFS directory already exists");
                }
                Err(e) => {
                    warn!(path = %dir, error = %e, "Failed to create BeeGFS directory");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn set_pattern(
        &self,
        vol: &BeegfsVolume,
        pattern: &StripePatternConfig,
    ) -> Result<(), CtlError> {
        if pattern.is_empty() {
            return Ok(());
        }

        let mut args = vec!["--setpattern".to_string()];
        if let Some(pool) = &pattern.storage_pool_id {
            args.push(format!("--storagepoolid={}", pool));
        }
        if let Some(chunk_size) = &pattern.chunk_size {
            args.push(format!("--chunksize={}", chunk_size));
        }
        if let Some(num_targets) = &pattern.num_targets {
            args.push(format!("--numtargets={}", num_targets));
        }
        args.push(vol.remote_path.clone());

        self.run(vol, &args).await?;
        debug!(path = %vol.remote_path, ?pattern, "Applied stripe pattern");
        Ok(())
    }

    async fn stat_directory(&self, vol: &BeegfsVolume) -> Result<EntryInfo, CtlError> {
        let args = vec!["--getentryinfo".to_string(), vol.remote_path.clone()];
        let stdout = self.run(vol, &args).await?;
        Ok(parse_entry_info(&stdout))
    }
}

/// Every directory from the first component down to `path` itself
///
/// `/scratch/a/b` → `["/scratch", "/scratch/a", "/scratch/a/b"]`
fn remote_ancestors(path: &str) -> Vec<String> {
    let mut current = String::new();
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| {
            current.push('/');
            current.push_str(part);
            current.clone()
        })
        .collect()
}

/// Parse `beegfs-ctl --getentryinfo` output
///
/// Unknown lines are ignored; missing fields stay empty.
pub fn parse_entry_info(output: &str) -> EntryInfo {
    let mut info = EntryInfo::default();

    for line in output.lines() {
        let line = line.trim().trim_start_matches('+').trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "Entry type" => info.entry_type = value.to_string(),
            "EntryID" => info.entry_id = value.to_string(),
            "Metadata node" => info.metadata_node = value.to_string(),
            "Chunksize" => info.chunk_size = value.to_string(),
            "Number of storage targets" => {
                info.num_targets = value.trim_start_matches("desired:").trim().to_string()
            }
            "Storage Pool" => info.storage_pool = value.to_string(),
            _ => {}
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY_INFO: &str = "\
Entry type: directory
EntryID: 0-5F2A1B3C-1
Metadata node: meta01 [ID: 1]
Stripe pattern details:
+ Type: RAID0
+ Chunksize: 512K
+ Number of storage targets: desired: 4
+ Storage Pool: 1 (Default)
";

    #[test]
    fn test_parse_entry_info() {
        let info = parse_entry_info(ENTRY_INFO);
        assert_eq!(info.entry_type, "directory");
        assert_eq!(info.entry_id, "0-5F2A1B3C-1");
        assert_eq!(info.metadata_node, "meta01 [ID: 1]");
        assert_eq!(info.chunk_size, "512K");
        assert_eq!(info.num_targets, "4");
        assert_eq!(info.storage_pool, "1 (Default)");
    }

    #[test]
    fn test_parse_entry_info_ignores_noise() {
        let info = parse_entry_info("garbage\n\nEntry type: file\n");
        assert_eq!(info.entry_type, "file");
        assert!(info.entry_id.is_empty());
    }

    #[test]
    fn test_remote_ancestors() {
        assert_eq!(
            remote_ancestors("/scratch/a/b"),
            vec!["/scratch", "/scratch/a", "/scratch/a/b"]
        );
        assert_eq!(remote_ancestors("/pvc"), vec!["/pvc"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        use crate::domain::plugin_config::FileSystemConfig;
        use crate::domain::volume::VolumeId;

        let id = VolumeId::encode("10.0.0.1", "/scratch/pvc-1").unwrap();
        let vol = BeegfsVolume::new("/tmp/anchor".into(), id, FileSystemConfig::default());
        let ctl = BeegfsCtlExecutor::new("/nonexistent/beegfs-ctl", Duration::from_secs(1));

        let err = ctl.stat_directory(&vol).await.unwrap_err();
        assert!(matches!(err, CtlError::Io(_)));
    }
}
