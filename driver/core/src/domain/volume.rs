// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Identity and Descriptor
//!
//! A BeeGFS CSI volume is a directory inside a BeeGFS file system. The only
//! durable handle the container orchestrator keeps is the [`VolumeId`], an
//! opaque string of the form `beegfs://<sysMgmtdHost><remote path>` that can
//! always be decoded back into the management host and the directory path.
//!
//! [`BeegfsVolume`] is the per-RPC descriptor built from a [`VolumeId`]: it
//! carries the local anchor directory (client configuration + mount point)
//! and every derived path the controller and node services need. It is never
//! persisted; each RPC rebuilds it from the ID.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Volume identifier codec and descriptor value objects

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::plugin_config::FileSystemConfig;

/// Scheme prefix of every volume ID produced by this driver
pub const VOLUME_ID_SCHEME: &str = "beegfs://";

/// Name of the client configuration file inside an anchor directory
pub const CLIENT_CONF_FILE_NAME: &str = "beegfs-client.conf";

/// Name of the mount point directory inside an anchor directory
pub const MOUNT_DIR_NAME: &str = "mount";

/// Characters escaped when turning a volume ID into a directory name.
///
/// `%` and `_` must be escaped so that the final `/` → `_` substitution stays
/// injective; the rest are illegal or troublesome in directory names.
const ANCHOR_ESCAPE_SET: &AsciiSet = &CONTROLS
    .add(b'%')
    .add(b'_')
    .add(b' ')
    .add(b'"')
    .add(b'*')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'|');

/// Volume identifier errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VolumeIdError {
    #[error("sysMgmtdHost must not be empty")]
    EmptyHost,

    #[error("volume path must not be empty")]
    EmptyPath,

    #[error("sysMgmtdHost {0:?} must not contain '/'")]
    InvalidHost(String),

    #[error("volume path {0:?} must be absolute, normalized and below the file system root")]
    InvalidPath(String),

    #[error("volume ID {0:?} is not of the form beegfs://<sysMgmtdHost>/<path>")]
    Malformed(String),
}

// ============================================================================
// Value Objects
// ============================================================================

/// Opaque, reversible identifier of a BeeGFS volume
///
/// Invariant: the wrapped string is always `beegfs://<host><path>` where
/// `host` is non-empty and slash-free and `path` is an absolute, normalized
/// path other than `/`. Both constructors enforce it, so accessors never fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeId {
    id: String,
    host_len: usize,
}

impl VolumeId {
    /// Encode a management host and a BeeGFS directory path into a volume ID
    ///
    /// # Arguments
    /// * `sys_mgmtd_host` - BeeGFS management service address (e.g. "10.0.0.1")
    /// * `remote_path` - Normalized absolute path of the volume directory
    ///
    /// # Returns
    /// * `Ok(VolumeId)` - e.g. `beegfs://10.0.0.1/scratch/pvc-1`
    /// * `Err(VolumeIdError)` - if either input is empty or not canonical
    pub fn encode(sys_mgmtd_host: &str, remote_path: &str) -> Result<Self, VolumeIdError> {
        validate_host(sys_mgmtd_host)?;
        validate_remote_path(remote_path)?;

        Ok(Self {
            id: format!("{}{}{}", VOLUME_ID_SCHEME, sys_mgmtd_host, remote_path),
            host_len: sys_mgmtd_host.len(),
        })
    }

    /// Decode a volume ID received from the container orchestrator
    pub fn parse(volume_id: &str) -> Result<Self, VolumeIdError> {
        let malformed = || VolumeIdError::Malformed(volume_id.to_string());

        let rest = volume_id.strip_prefix(VOLUME_ID_SCHEME).ok_or_else(malformed)?;
        let split = rest.find('/').ok_or_else(malformed)?;
        let (host, path) = rest.split_at(split);

        Self::encode(host, path).map_err(|_| malformed())
    }

    /// Management host encoded in this ID
    pub fn sys_mgmtd_host(&self) -> &str {
        let start = VOLUME_ID_SCHEME.len();
        &self.id[start..start + self.host_len]
    }

    /// BeeGFS directory path encoded in this ID
    pub fn remote_path(&self) -> &str {
        &self.id[VOLUME_ID_SCHEME.len() + self.host_len..]
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Derive a single, filesystem-safe path component from this ID
    ///
    /// Strips the scheme, percent-escapes `%`, `_` and characters that are
    /// not portable in directory names, then replaces `/` with `_`:
    /// `beegfs://127.0.0.1/scratch/pvc-1` → `127.0.0.1_scratch_pvc-1`.
    pub fn sanitize(&self) -> String {
        let without_scheme = &self.id[VOLUME_ID_SCHEME.len()..];
        utf8_percent_encode(without_scheme, ANCHOR_ESCAPE_SET)
            .to_string()
            .replace('/', "_")
    }

    /// Local anchor directory for this volume below `data_root`
    pub fn anchor_dir(&self, data_root: &Path) -> PathBuf {
        data_root.join(self.sanitize())
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

fn validate_host(host: &str) -> Result<(), VolumeIdError> {
    if host.is_empty() {
        return Err(VolumeIdError::EmptyHost);
    }
    if host.contains('/') {
        return Err(VolumeIdError::InvalidHost(host.to_string()));
    }
    Ok(())
}

fn validate_remote_path(path: &str) -> Result<(), VolumeIdError> {
    if path.is_empty() {
        return Err(VolumeIdError::EmptyPath);
    }
    // The root directory is never a volume: deleting it would wipe the file system.
    if !path.starts_with('/') || path == "/" || clean_remote_path(path) != path {
        return Err(VolumeIdError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Lexically clean a BeeGFS path and root it at `/`
///
/// Collapses repeated separators, drops `.` components and resolves `..`
/// without ever climbing above the root: `scratch//a/../b/` → `/scratch/b`.
pub fn clean_remote_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Join a volume name onto a base path, returning a cleaned absolute path
pub fn join_remote_path(base_path: &str, name: &str) -> String {
    clean_remote_path(&format!("{}/{}", base_path, name))
}

// ============================================================================
// Descriptor
// ============================================================================

/// Everything an RPC handler needs to know about one volume
///
/// Built fresh at the start of every RPC and dropped at its end.
#[derive(Debug, Clone)]
pub struct BeegfsVolume {
    pub volume_id: VolumeId,

    /// BeeGFS management service address
    pub sys_mgmtd_host: String,

    /// Parent directory of the volume inside the BeeGFS namespace
    pub base_path: String,

    /// Volume directory inside the BeeGFS namespace (e.g. "/scratch/pvc-1")
    pub remote_path: String,

    /// Transient local directory holding client files and the mount point
    pub anchor_dir: PathBuf,

    /// `<anchor_dir>/mount`
    pub mount_path: PathBuf,

    /// `<anchor_dir>/beegfs-client.conf`
    pub client_conf_path: PathBuf,

    /// Where the volume directory shows up once BeeGFS is mounted at `mount_path`
    pub mounted_volume_path: PathBuf,

    /// Client network configuration resolved for `sys_mgmtd_host`
    pub config: FileSystemConfig,
}

impl BeegfsVolume {
    pub fn new(anchor_dir: PathBuf, volume_id: VolumeId, config: FileSystemConfig) -> Self {
        let sys_mgmtd_host = volume_id.sys_mgmtd_host().to_string();
        let remote_path = volume_id.remote_path().to_string();
        let base_path = Path::new(&remote_path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());

        let mount_path = anchor_dir.join(MOUNT_DIR_NAME);
        let client_conf_path = anchor_dir.join(CLIENT_CONF_FILE_NAME);
        let mounted_volume_path = mount_path.join(remote_path.trim_start_matches('/'));

        Self {
            volume_id,
            sys_mgmtd_host,
            base_path,
            remote_path,
            anchor_dir,
            mount_path,
            client_conf_path,
            mounted_volume_path,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_encode_decode_roundtrip() {
        let pairs = [
            ("10.0.0.1", "/scratch/pvc-1"),
            ("mgmtd.example.com", "/a"),
            ("fe80::1", "/with space/and_underscore"),
            ("host_1", "/100%/über"),
        ];

        for (host, path) in pairs {
            let id = VolumeId::encode(host, path).unwrap();
            let decoded = VolumeId::parse(id.as_str()).unwrap();
            assert_eq!(decoded.sys_mgmtd_host(), host);
            assert_eq!(decoded.remote_path(), path);
            assert_eq!(decoded, id);
        }
    }

    #[test]
    fn test_encode_format() {
        let id = VolumeId::encode("10.0.0.1", "/scratch/pvc-1").unwrap();
        assert_eq!(id.to_string(), "beegfs://10.0.0.1/scratch/pvc-1");
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = VolumeId::encode("10.0.0.1", "/scratch/pvc-1").unwrap();
        let b = VolumeId::encode("10.0.0.1", "/scratch/pvc-1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.sanitize(), b.sanitize());
    }

    #[test]
    fn test_encode_rejects_empty_inputs() {
        assert_eq!(VolumeId::encode("", "/scratch"), Err(VolumeIdError::EmptyHost));
        assert_eq!(VolumeId::encode("10.0.0.1", ""), Err(VolumeIdError::EmptyPath));
    }

    #[test]
    fn test_encode_rejects_non_canonical_paths() {
        for path in ["scratch/pvc", "/", "/scratch/../pvc", "/scratch//pvc", "/scratch/"] {
            assert!(
                matches!(VolumeId::encode("h", path), Err(VolumeIdError::InvalidPath(_))),
                "path {:?} should be rejected",
                path
            );
        }
        assert!(matches!(
            VolumeId::encode("a/b", "/scratch"),
            Err(VolumeIdError::InvalidHost(_))
        ));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for id in [
            "",
            "10.0.0.1/scratch",
            "nfs://10.0.0.1/scratch",
            "beegfs://10.0.0.1",
            "beegfs:///scratch",
            "beegfs://10.0.0.1/",
            "beegfs://10.0.0.1/scratch/../..",
        ] {
            assert!(
                matches!(VolumeId::parse(id), Err(VolumeIdError::Malformed(_))),
                "{:?} should be malformed",
                id
            );
        }
    }

    #[test]
    fn test_sanitize_example() {
        let id = VolumeId::parse("beegfs://127.0.0.1/scratch/pvc-12345678").unwrap();
        assert_eq!(id.sanitize(), "127.0.0.1_scratch_pvc-12345678");
    }

    #[test]
    fn test_sanitize_is_single_path_component() {
        let id = VolumeId::encode("fe80::1", "/a b/c\\d/e:f").unwrap();
        let name = id.sanitize();
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
        assert!(!name.contains(':'));
        assert_eq!(Path::new(&name).components().count(), 1);
    }

    #[test]
    fn test_sanitize_is_injective_on_separator_lookalikes() {
        let ids = [
            VolumeId::encode("h", "/a_b").unwrap(),
            VolumeId::encode("h", "/a/b").unwrap(),
            VolumeId::encode("h_a", "/b").unwrap(),
            VolumeId::encode("h", "/a%5Fb").unwrap(),
            VolumeId::encode("h", "/a/_b").unwrap(),
            VolumeId::encode("h", "/a_/b").unwrap(),
        ];
        let names: HashSet<String> = ids.iter().map(VolumeId::sanitize).collect();
        assert_eq!(names.len(), ids.len());
    }

    #[test]
    fn test_clean_remote_path() {
        assert_eq!(clean_remote_path("scratch"), "/scratch");
        assert_eq!(clean_remote_path("/scratch/"), "/scratch");
        assert_eq!(clean_remote_path("scratch//a/./b"), "/scratch/a/b");
        assert_eq!(clean_remote_path("/../../etc"), "/etc");
        assert_eq!(clean_remote_path(""), "/");
    }

    #[test]
    fn test_join_remote_path() {
        assert_eq!(join_remote_path("/scratch", "pvc-1"), "/scratch/pvc-1");
        assert_eq!(join_remote_path("/", "pvc-1"), "/pvc-1");
    }

    #[test]
    fn test_descriptor_paths() {
        let id = VolumeId::encode("10.0.0.1", "/scratch/pvc-1").unwrap();
        let anchor = id.anchor_dir(Path::new("/var/lib/beegfs-csi"));
        let vol = BeegfsVolume::new(anchor, id, FileSystemConfig::default());

        assert_eq!(vol.sys_mgmtd_host, "10.0.0.1");
        assert_eq!(vol.base_path, "/scratch");
        assert_eq!(vol.remote_path, "/scratch/pvc-1");
        assert_eq!(vol.anchor_dir, PathBuf::from("/var/lib/beegfs-csi/10.0.0.1_scratch_pvc-1"));
        assert_eq!(
            vol.client_conf_path,
            PathBuf::from("/var/lib/beegfs-csi/10.0.0.1_scratch_pvc-1/beegfs-client.conf")
        );
        assert_eq!(
            vol.mounted_volume_path,
            PathBuf::from("/var/lib/beegfs-csi/10.0.0.1_scratch_pvc-1/mount/scratch/pvc-1")
        );
    }
}
