// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CSI Controller service
//!
//! CreateVolume, DeleteVolume, ValidateVolumeCapabilities and
//! ControllerGetCapabilities are served by [`ControllerService`]; every
//! other controller RPC answers `Unimplemented` without side effects.

use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::debug;

use super::csi::controller_server::{Controller, ControllerServer};
use super::csi::*;
use super::{record, to_domain_capabilities};
use crate::application::controller::{
    CapabilityValidation, ControllerCapability, ControllerService,
};

pub struct CsiControllerService {
    service: Arc<ControllerService>,
}

impl CsiControllerService {
    pub fn new(service: Arc<ControllerService>) -> Self {
        Self { service }
    }

    /// Create a gRPC server instance
    pub fn into_server(self) -> ControllerServer<Self> {
        ControllerServer::new(self)
    }
}

fn unimplemented<T>(method: &'static str) -> Result<Response<T>, Status> {
    debug!(method, "Unimplemented controller RPC called");
    let result = Err(Status::unimplemented(format!("{} is not supported", method)));
    record(method, &result);
    result
}

#[tonic::async_trait]
impl Controller for CsiControllerService {
    async fn create_volume(
        &self,
        request: Request<CreateVolumeRequest>,
    ) -> Result<Response<CreateVolumeResponse>, Status> {
        let req = request.into_inner();
        let capabilities = to_domain_capabilities(&req.volume_capabilities);

        let result = self
            .service
            .create_volume(&req.name, &capabilities, &req.parameters)
            .await
            .map(|volume_id| {
                Response::new(CreateVolumeResponse {
                    volume: Some(Volume {
                        volume_id: volume_id.to_string(),
                        ..Default::default()
                    }),
                })
            })
            .map_err(Status::from);

        record("CreateVolume", &result);
        result
    }

    async fn delete_volume(
        &self,
        request: Request<DeleteVolumeRequest>,
    ) -> Result<Response<DeleteVolumeResponse>, Status> {
        let req = request.into_inner();

        let result = self
            .service
            .delete_volume(&req.volume_id)
            .await
            .map(|()| Response::new(DeleteVolumeResponse {}))
            .map_err(Status::from);

        record("DeleteVolume", &result);
        result
    }

    async fn controller_publish_volume(
        &self,
        _request: Request<ControllerPublishVolumeRequest>,
    ) -> Result<Response<ControllerPublishVolumeResponse>, Status> {
        unimplemented("ControllerPublishVolume")
    }

    async fn controller_unpublish_volume(
        &self,
        _request: Request<ControllerUnpublishVolumeRequest>,
    ) -> Result<Response<ControllerUnpublishVolumeResponse>, Status> {
        unimplemented("ControllerUnpublishVolume")
    }

    async fn validate_volume_capabilities(
        &self,
        request: Request<ValidateVolumeCapabilitiesRequest>,
    ) -> Result<Response<ValidateVolumeCapabilitiesResponse>, Status> {
        let req = request.into_inner();
        let capabilities = to_domain_capabilities(&req.volume_capabilities);

        let result = self
            .service
            .validate_volume_capabilities(&req.volume_id, &capabilities)
            .await
            .map(|outcome| {
                let response = match outcome {
                    CapabilityValidation::Confirmed => ValidateVolumeCapabilitiesResponse {
                        // Volume context and parameters are not validated, so they are not confirmed.
                        confirmed: Some(validate_volume_capabilities_response::Confirmed {
                            volume_capabilities: req.volume_capabilities,
                            ..Default::default()
                        }),
                        message: String::new(),
                    },
                    CapabilityValidation::Rejected(reason) => ValidateVolumeCapabilitiesResponse {
                        confirmed: None,
                        message: reason,
                    },
                };
                Response::new(response)
            })
            .map_err(Status::from);

        record("ValidateVolumeCapabilities", &result);
        result
    }

    async fn list_volumes(
        &self,
        _request: Request<ListVolumesRequest>,
    ) -> Result<Response<ListVolumesResponse>, Status> {
        unimplemented("ListVolumes")
    }

    async fn get_capacity(
        &self,
        _request: Request<GetCapacityRequest>,
    ) -> Result<Response<GetCapacityResponse>, Status> {
        unimplemented("GetCapacity")
    }

    async fn controller_get_capabilities(
        &self,
        _request: Request<ControllerGetCapabilitiesRequest>,
    ) -> Result<Response<ControllerGetCapabilitiesResponse>, Status> {
        let capabilities = self
            .service
            .capabilities()
            .iter()
            .map(|capability| {
                let rpc_type = match capability {
                    ControllerCapability::CreateDeleteVolume => {
                        controller_service_capability::rpc::Type::CreateDeleteVolume
                    }
                };
                ControllerServiceCapability {
                    r#type: Some(controller_service_capability::Type::Rpc(
                        controller_service_capability::Rpc {
                            r#type: rpc_type as i32,
                        },
                    )),
                }
            })
            .collect();

        let result = Ok(Response::new(ControllerGetCapabilitiesResponse { capabilities }));
        record("ControllerGetCapabilities", &result);
        result
    }

    async fn create_snapshot(
        &self,
        _request: Request<CreateSnapshotRequest>,
    ) -> Result<Response<CreateSnapshotResponse>, Status> {
        unimplemented("CreateSnapshot")
    }

    async fn delete_snapshot(
        &self,
        _request: Request<DeleteSnapshotRequest>,
    ) -> Result<Response<DeleteSnapshotResponse>, Status> {
        unimplemented("DeleteSnapshot")
    }

    async fn list_snapshots(
        &self,
        _request: Request<ListSnapshotsRequest>,
    ) -> Result<Response<ListSnapshotsResponse>, Status> {
        unimplemented("ListSnapshots")
    }

    async fn controller_expand_volume(
        &self,
        _request: Request<ControllerExpandVolumeRequest>,
    ) -> Result<Response<ControllerExpandVolumeResponse>, Status> {
        unimplemented("ControllerExpandVolume")
    }

    async fn controller_get_volume(
        &self,
        _request: Request<ControllerGetVolumeRequest>,
    ) -> Result<Response<ControllerGetVolumeResponse>, Status> {
        unimplemented("ControllerGetVolume")
    }
}
