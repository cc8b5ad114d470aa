// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Client Configuration Materializer
//!
//! Renders the per-volume `beegfs-client.conf` from a template plus the
//! resolved [`FileSystemConfig`], and writes the connection filter files it
//! points to. Both `beegfs-ctl --unmounted` and the kernel client read these
//! files, so they have to exist inside the anchor directory before either is
//! used.
//!
//! Files are written to a temporary file in the anchor and renamed into
//! place, so a concurrent reader never observes a partial file.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::domain::volume::BeegfsVolume;

pub const CONN_INTERFACES_FILE_NAME: &str = "connInterfacesFile";
pub const CONN_NET_FILTER_FILE_NAME: &str = "connNetFilterFile";
pub const CONN_TCP_ONLY_FILTER_FILE_NAME: &str = "connTcpOnlyFilterFile";

/// Default location of the stock client configuration shipped with BeeGFS
pub const DEFAULT_CLIENT_CONF_TEMPLATE_PATH: &str = "/etc/beegfs/beegfs-client.conf";

#[derive(Debug, Error)]
pub enum ClientConfError {
    #[error("failed to read client configuration template {path:?}: {source}")]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("client configuration writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Write `beegfs-client.conf` and its connection files into `vol.anchor_dir`
///
/// The anchor directory must already exist.
pub async fn write_client_files(
    vol: &BeegfsVolume,
    template_path: &Path,
) -> Result<(), ClientConfError> {
    let template =
        tokio::fs::read_to_string(template_path)
            .await
            .map_err(|source| ClientConfError::Template {
                path: template_path.to_path_buf(),
                source,
            })?;

    let mut files: Vec<(PathBuf, String)> = Vec::new();
    let mut overrides: Vec<(String, String)> =
        vec![("sysMgmtdHost".to_string(), vol.sys_mgmtd_host.clone())];

    let lists = [
        (CONN_INTERFACES_FILE_NAME, &vol.config.conn_interfaces),
        (CONN_NET_FILTER_FILE_NAME, &vol.config.conn_net_filter),
        (CONN_TCP_ONLY_FILTER_FILE_NAME, &vol.config.conn_tcp_only_filter),
    ];
    for (name, entries) in lists {
        if entries.is_empty() {
            continue;
        }
        let path = vol.anchor_dir.join(name);
        overrides.push((name.to_string(), path.display().to_string()));
        files.push((path, format!("{}\n", entries.join("\n"))));
    }

    for (key, value) in &vol.config.beegfs_client_conf {
        overrides.push((key.clone(), value.clone()));
    }

    files.push((
        vol.client_conf_path.clone(),
        render_client_conf(&template, &overrides),
    ));

    let anchor_dir = vol.anchor_dir.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ClientConfError> {
        for (path, contents) in &files {
            write_atomic(&anchor_dir, path, contents)?;
        }
        Ok(())
    })
    .await??;

    debug!(
        volume_id = %vol.volume_id,
        conf = %vol.client_conf_path.display(),
        "Wrote BeeGFS client configuration"
    );
    Ok(())
}

/// Every file [`write_client_files`] may create for `vol`
pub fn client_file_paths(vol: &BeegfsVolume) -> [PathBuf; 4] {
    [
        vol.client_conf_path.clone(),
        vol.anchor_dir.join(CONN_INTERFACES_FILE_NAME),
        vol.anchor_dir.join(CONN_NET_FILTER_FILE_NAME),
        vol.anchor_dir.join(CONN_TCP_ONLY_FILTER_FILE_NAME),
    ]
}

/// Apply `key = value` overrides to a client configuration template
///
/// Keys already present in the template are rewritten in place; the rest
/// are appended in the given order. Comments and blank lines are kept.
pub fn render_client_conf(template: &str, overrides: &[(String, String)]) -> String {
    let mut applied = vec![false; overrides.len()];
    let mut out = String::with_capacity(template.len() + 64 * overrides.len());

    for line in template.lines() {
        let trimmed = line.trim_start();
        let key = if trimmed.starts_with('#') {
            None
        } else {
            trimmed.split_once('=').map(|(k, _)| k.trim())
        };

        match key.and_then(|k| overrides.iter().position(|(o, _)| o == k)) {
            Some(index) => {
                let (k, v) = &overrides[index];
                out.push_str(&format!("{} = {}\n", k, v));
                applied[index] = true;
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    for ((key, value), done) in overrides.iter().zip(applied) {
        if !done {
            out.push_str(&format!("{} = {}\n", key, value));
        }
    }

    out
}

fn write_atomic(dir: &Path, path: &Path, contents: &str) -> Result<(), ClientConfError> {
    let write_err = |source: std::io::Error| ClientConfError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
