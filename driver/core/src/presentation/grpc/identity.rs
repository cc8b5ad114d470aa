// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CSI Identity service

use tonic::{Request, Response, Status};

use super::csi::identity_server::{Identity, IdentityServer};
use super::csi::*;
use super::record;

pub struct CsiIdentityService {
    driver_name: String,
    vendor_version: String,
    controller_enabled: bool,
}

impl CsiIdentityService {
    /// # Arguments
    /// * `driver_name` - CSI driver name, e.g. "beegfs.csi.netapp.com"
    /// * `controller_enabled` - whether the Controller service is served by this process
    pub fn new(driver_name: impl Into<String>, controller_enabled: bool) -> Self {
        Self {
            driver_name: driver_name.into(),
            vendor_version: env!("CARGO_PKG_VERSION").to_string(),
            controller_enabled,
        }
    }

    pub fn into_server(self) -> IdentityServer<Self> {
        IdentityServer::new(self)
    }
}

#[tonic::async_trait]
impl Identity for CsiIdentityService {
    async fn get_plugin_info(
        &self,
        _request: Request<GetPluginInfoRequest>,
    ) -> Result<Response<GetPluginInfoResponse>, Status> {
        let result = if self.driver_name.is_empty() {
            Err(Status::unavailable("Driver name not configured"))
        } else {
            Ok(Response::new(GetPluginInfoResponse {
                name: self.driver_name.clone(),
                vendor_version: self.vendor_version.clone(),
                manifest: Default::default(),
            }))
        };

        record("GetPluginInfo", &result);
        result
    }

    async fn get_plugin_capabilities(
        &self,
        _request: Request<GetPluginCapabilitiesRequest>,
    ) -> Result<Response<GetPluginCapabilitiesResponse>, Status> {
        let mut capabilities = Vec::new();
        if self.controller_enabled {
            capabilities.push(PluginCapability {
                r#type: Some(plugin_capability::Type::Service(plugin_capability::Service {
                    r#type: plugin_capability::service::Type::ControllerService as i32,
                })),
            });
        }

        let result = Ok(Response::new(GetPluginCapabilitiesResponse { capabilities }));
        record("GetPluginCapabilities", &result);
        result
    }

    async fn probe(
        &self,
        _request: Request<ProbeRequest>,
    ) -> Result<Response<ProbeResponse>, Status> {
        let result = Ok(Response::new(ProbeResponse { ready: Some(true) }));
        record("Probe", &result);
        result
    }
}
