// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! System Mounter
//!
//! [`Mounter`] backed by the `mount`/`umount` binaries and the kernel's
//! `/proc/self/mountinfo` table.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::domain::mount::{MountError, Mounter};

const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

pub struct SystemMounter {
    mountinfo_path: PathBuf,
}

impl SystemMounter {
    pub fn new() -> Self {
        Self {
            mountinfo_path: PathBuf::from(MOUNTINFO_PATH),
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<(), MountError> {
        debug!(program, args = %args.join(" "), "Running mount command");

        let output = Command::new(program).args(args).output().await?;
        if output.status.success() {
            return Ok(());
        }

        Err(MountError::Command {
            command: format!("{} {}", program, args.join(" ")),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl Default for SystemMounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mounter for SystemMounter {
    async fn is_mount_point(&self, path: &Path) -> Result<bool, MountError> {
        let canonical = match tokio::fs::canonicalize(path).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let table = tokio::fs::read_to_string(&self.mountinfo_path).await?;
        Ok(parse_mount_points(&table).iter().any(|p| *p == canonical))
    }

    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), MountError> {
        let mut args = Vec::new();
        if !fs_type.is_empty() {
            args.push("-t".to_string());
            args.push(fs_type.to_string());
        }
        if !options.is_empty() {
            args.push("-o".to_string());
            args.push(options.join(","));
        }
        args.push(source.to_string());
        args.push(target.display().to_string());

        self.run("mount", &args).await
    }

    async fn unmount(&self, target: &Path) -> Result<(), MountError> {
        self.run("umount", &[target.display().to_string()]).await
    }
}

/// Mount points listed in a mountinfo table (fifth field of each line)
pub fn parse_mount_points(mountinfo: &str) -> Vec<PathBuf> {
    mountinfo
        .lines()
        .filter_map(|line| line.split_whitespace().nth(4))
        .map(|field| PathBuf::from(unescape_octal(field)))
        .collect()
}

/// Decode the `\ooo` escapes the kernel uses for whitespace and backslashes
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
