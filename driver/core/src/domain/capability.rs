// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Capabilities
//!
//! Protocol-independent view of the CSI `VolumeCapability` message and the
//! rules deciding which capabilities a BeeGFS directory volume can honor.
//!
//! BeeGFS volumes are shared POSIX directories: they can always be mounted
//! by many nodes at once, but they are never raw block devices, and the
//! driver has no way to enforce the exclusive single-node guarantees of the
//! newer `SINGLE_NODE_SINGLE_WRITER` / `SINGLE_NODE_MULTI_WRITER` modes.

use thiserror::Error;

/// Access mode requested by the container orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Unknown,
    SingleNodeWriter,
    SingleNodeReaderOnly,
    MultiNodeReaderOnly,
    MultiNodeSingleWriter,
    MultiNodeMultiWriter,
    SingleNodeSingleWriter,
    SingleNodeMultiWriter,
}

impl AccessMode {
    /// Whether a BeeGFS directory volume can be offered with this mode
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            AccessMode::SingleNodeWriter
                | AccessMode::SingleNodeReaderOnly
                | AccessMode::MultiNodeReaderOnly
                | AccessMode::MultiNodeSingleWriter
                | AccessMode::MultiNodeMultiWriter
        )
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, AccessMode::SingleNodeReaderOnly | AccessMode::MultiNodeReaderOnly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::Unknown => "UNKNOWN",
            AccessMode::SingleNodeWriter => "SINGLE_NODE_WRITER",
            AccessMode::SingleNodeReaderOnly => "SINGLE_NODE_READER_ONLY",
            AccessMode::MultiNodeReaderOnly => "MULTI_NODE_READER_ONLY",
            AccessMode::MultiNodeSingleWriter => "MULTI_NODE_SINGLE_WRITER",
            AccessMode::MultiNodeMultiWriter => "MULTI_NODE_MULTI_WRITER",
            AccessMode::SingleNodeSingleWriter => "SINGLE_NODE_SINGLE_WRITER",
            AccessMode::SingleNodeMultiWriter => "SINGLE_NODE_MULTI_WRITER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessType {
    /// File system access; `fs_type` and `mount_flags` come from the request
    Mount {
        fs_type: String,
        mount_flags: Vec<String>,
    },
    Block,
}

/// One requested capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeCapability {
    pub access_type: Option<AccessType>,
    pub access_mode: Option<AccessMode>,
}

impl VolumeCapability {
    /// Mount access with the given mode and no extra flags
    pub fn mount(mode: AccessMode) -> Self {
        Self {
            access_type: Some(AccessType::Mount {
                fs_type: String::new(),
                mount_flags: Vec::new(),
            }),
            access_mode: Some(mode),
        }
    }

    pub fn mount_flags(&self) -> &[String] {
        match &self.access_type {
            Some(AccessType::Mount { mount_flags, .. }) => mount_flags,
            _ => &[],
        }
    }
}

/// Reason a set of capabilities cannot be honored
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CapabilityRejection(pub String);

/// Check every requested capability against what BeeGFS volumes support
///
/// The first unsupported capability decides the rejection reason. An empty
/// list is vacuously confirmed; callers that require at least one
/// capability check that themselves.
pub fn check_capabilities(capabilities: &[VolumeCapability]) -> Result<(), CapabilityRejection> {
    for capability in capabilities {
        if let Some(AccessType::Block) = capability.access_type {
            return Err(CapabilityRejection(
                "block access type not supported".to_string(),
            ));
        }

        match capability.access_mode {
            None => {
                return Err(CapabilityRejection("access mode not provided".to_string()));
            }
            Some(mode) if !mode.is_supported() => {
                return Err(CapabilityRejection(format!(
                    "access mode {} not supported",
                    mode.as_str()
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
