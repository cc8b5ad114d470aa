// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CSI Node service
//!
//! Volumes are published straight to the target path; there is no staging
//! step, so NodeStageVolume / NodeUnstageVolume are not offered.

use std::path::Path;
use std::sync::Arc;
use tonic::{Request, Response, Status};

use super::csi::node_server::{Node, NodeServer};
use super::csi::*;
use super::record;
use crate::application::node::NodeService;
use crate::domain::capability::VolumeCapability;

pub struct CsiNodeService {
    service: Arc<NodeService>,
}

impl CsiNodeService {
    pub fn new(service: Arc<NodeService>) -> Self {
        Self { service }
    }

    pub fn into_server(self) -> NodeServer<Self> {
        NodeServer::new(self)
    }
}

fn unimplemented<T>(method: &'static str) -> Result<Response<T>, Status> {
    let result = Err(Status::unimplemented(format!("{} is not supported", method)));
    record(method, &result);
    result
}

#[tonic::async_trait]
impl Node for CsiNodeService {
    async fn node_stage_volume(
        &self,
        _request: Request<NodeStageVolumeRequest>,
    ) -> Result<Response<NodeStageVolumeResponse>, Status> {
        unimplemented("NodeStageVolume")
    }

    async fn node_unstage_volume(
        &self,
        _request: Request<NodeUnstageVolumeRequest>,
    ) -> Result<Response<NodeUnstageVolumeResponse>, Status> {
        unimplemented("NodeUnstageVolume")
    }

    async fn node_publish_volume(
        &self,
        request: Request<NodePublishVolumeRequest>,
    ) -> Result<Response<NodePublishVolumeResponse>, Status> {
        let req = request.into_inner();
        let capability = req.volume_capability.as_ref().map(VolumeCapability::from);

        let result = self
            .service
            .publish_volume(
                &req.volume_id,
                Path::new(&req.target_path),
                capability.as_ref(),
                req.readonly,
            )
            .await
            .map(|()| Response::new(NodePublishVolumeResponse {}))
            .map_err(Status::from);

        record("NodePublishVolume", &result);
        result
    }

    async fn node_unpublish_volume(
        &self,
        request: Request<NodeUnpublishVolumeRequest>,
    ) -> Result<Response<NodeUnpublishVolumeResponse>, Status> {
        let req = request.into_inner();

        let result = self
            .service
            .unpublish_volume(&req.volume_id, Path::new(&req.target_path))
            .await
            .map(|()| Response::new(NodeUnpublishVolumeResponse {}))
            .map_err(Status::from);

        record("NodeUnpublishVolume", &result);
        result
    }

    async fn node_get_volume_stats(
        &self,
        _request: Request<NodeGetVolumeStatsRequest>,
    ) -> Result<Response<NodeGetVolumeStatsResponse>, Status> {
        unimplemented("NodeGetVolumeStats")
    }

    async fn node_expand_volume(
        &self,
        _request: Request<NodeExpandVolumeRequest>,
    ) -> Result<Response<NodeExpandVolumeResponse>, Status> {
        unimplemented("NodeExpandVolume")
    }

    async fn node_get_capabilities(
        &self,
        _request: Request<NodeGetCapabilitiesRequest>,
    ) -> Result<Response<NodeGetCapabilitiesResponse>, Status> {
        let result = Ok(Response::new(NodeGetCapabilitiesResponse {
            capabilities: Vec::new(),
        }));
        record("NodeGetCapabilities", &result);
        result
    }

    async fn node_get_info(
        &self,
        _request: Request<NodeGetInfoRequest>,
    ) -> Result<Response<NodeGetInfoResponse>, Status> {
        let result = Ok(Response::new(NodeGetInfoResponse {
            node_id: self.service.node_id().to_string(),
            ..Default::default()
        }));
        record("NodeGetInfo", &result);
        result
    }
}
