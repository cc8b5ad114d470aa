// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! CSI gRPC Services
//!
//! Tonic implementations of the CSI Identity, Controller and Node services.
//! Handlers translate protobuf messages into domain types, call the
//! application services and map their errors onto gRPC status codes.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** CSI v1 wire surface

pub mod controller;
pub mod identity;
pub mod node;
pub mod server;

use metrics::counter;
use tonic::{Code, Status};

use crate::application::controller::ControllerError;
use crate::application::node::NodeError;
use crate::domain::capability::{AccessMode, AccessType, VolumeCapability};

// Generated protobuf code
pub mod csi {
    tonic::include_proto!("csi.v1");
}

use csi::volume_capability::access_mode::Mode;

impl From<ControllerError> for Status {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::InvalidArgument(msg) => Status::invalid_argument(msg),
            ControllerError::NotFound(msg) => Status::not_found(msg),
            ControllerError::Internal(e) => Status::internal(format!("{:#}", e)),
        }
    }
}

impl From<NodeError> for Status {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::InvalidArgument(msg) => Status::invalid_argument(msg),
            NodeError::Internal(e) => Status::internal(format!("{:#}", e)),
        }
    }
}

impl From<Mode> for AccessMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Unknown => AccessMode::Unknown,
            Mode::SingleNodeWriter => AccessMode::SingleNodeWriter,
            Mode::SingleNodeReaderOnly => AccessMode::SingleNodeReaderOnly,
            Mode::MultiNodeReaderOnly => AccessMode::MultiNodeReaderOnly,
            Mode::MultiNodeSingleWriter => AccessMode::MultiNodeSingleWriter,
            Mode::MultiNodeMultiWriter => AccessMode::MultiNodeMultiWriter,
            Mode::SingleNodeSingleWriter => AccessMode::SingleNodeSingleWriter,
            Mode::SingleNodeMultiWriter => AccessMode::SingleNodeMultiWriter,
        }
    }
}

impl From<&csi::VolumeCapability> for VolumeCapability {
    fn from(cap: &csi::VolumeCapability) -> Self {
        let access_type = cap.access_type.as_ref().map(|t| match t {
            csi::volume_capability::AccessType::Block(_) => AccessType::Block,
            csi::volume_capability::AccessType::Mount(m) => AccessType::Mount {
                fs_type: m.fs_type.clone(),
                mount_flags: m.mount_flags.clone(),
            },
        });

        VolumeCapability {
            access_type,
            access_mode: cap.access_mode.as_ref().map(|m| m.mode().into()),
        }
    }
}

pub(crate) fn to_domain_capabilities(caps: &[csi::VolumeCapability]) -> Vec<VolumeCapability> {
    caps.iter().map(VolumeCapability::from).collect()
}

/// Count an RPC and, when it failed, its status code
pub(crate) fn record<T>(method: &'static str, result: &Result<T, Status>) {
    counter!("beegfs_csi_rpc_requests_total", "method" => method).increment(1);
    if let Err(status) = result {
        let code = code_label(status.code());
        counter!("beegfs_csi_rpc_errors_total", "method" => method, "code" => code).increment(1);
    }
}

fn code_label(code: Code) -> &'static str {
    match code {
        Code::Ok => "ok",
        Code::InvalidArgument => "invalid_argument",
        Code::NotFound => "not_found",
        Code::Internal => "internal",
        Code::Unimplemented => "unimplemented",
        Code::Cancelled => "cancelled",
        Code::DeadlineExceeded => "deadline_exceeded",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_conversion() {
        let cap = csi::VolumeCapability {
            access_type: Some(csi::volume_capability::AccessType::Mount(
                csi::volume_capability::MountVolume {
                    fs_type: "beegfs".into(),
                    mount_flags: vec!["noatime".into()],
                    volume_mount_group: String::new(),
                },
            )),
            access_mode: Some(csi::volume_capability::AccessMode {
                mode: Mode::MultiNodeMultiWriter as i32,
            }),
        };

        let domain = VolumeCapability::from(&cap);
        assert_eq!(domain.access_mode, Some(AccessMode::MultiNodeMultiWriter));
        assert_eq!(domain.mount_flags(), &["noatime".to_string()]);
    }

    #[test]
    fn test_missing_fields_stay_missing() {
        let domain = VolumeCapability::from(&csi::VolumeCapability::default());
        assert_eq!(domain.access_type, None);
        assert_eq!(domain.access_mode, None);
    }

    #[test]
    fn test_error_status_codes() {
        let status: Status = ControllerError::InvalidArgument("bad".into()).into();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "bad");

        let status: Status = ControllerError::NotFound("gone".into()).into();
        assert_eq!(status.code(), Code::NotFound);

        let err = anyhow::anyhow!("root cause").context("outer");
        let status: Status = ControllerError::Internal(err).into();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "outer: root cause");
    }
}
