// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Driver server implementation
//!
//! Builds the CSI services from a [`DriverConfig`] and serves them on the
//! configured endpoint until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use beegfs_csi_core::application::controller::ControllerService;
use beegfs_csi_core::application::node::NodeService;
use beegfs_csi_core::domain::ctl::CtlExecutor;
use beegfs_csi_core::domain::mount::Mounter;
use beegfs_csi_core::infrastructure::{BeegfsCtlExecutor, SystemMounter};
use beegfs_csi_core::presentation::grpc::controller::CsiControllerService;
use beegfs_csi_core::presentation::grpc::identity::CsiIdentityService;
use beegfs_csi_core::presentation::grpc::node::CsiNodeService;
use beegfs_csi_core::presentation::grpc::server::{serve, CsiServices};

use crate::config::DriverConfig;

pub async fn run_driver(config: DriverConfig) -> Result<()> {
    info!(
        driver_name = %config.driver_name,
        node_id = %config.node_id,
        controller = config.services.controller(),
        node = config.services.node(),
        "Starting BeeGFS CSI driver v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Some(addr) = config.metrics_address {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus metrics exporter")?;
        info!("Serving Prometheus metrics on http://{}/metrics", addr);
    }

    let ctl: Arc<dyn CtlExecutor> = Arc::new(BeegfsCtlExecutor::new(
        config.beegfs_ctl_path.clone(),
        config.ctl_timeout,
    ));
    let mounter: Arc<dyn Mounter> = Arc::new(SystemMounter::new());

    let services = build_services(&config, ctl, mounter);
    serve(config.endpoint.clone(), services, shutdown_signal()).await?;

    info!("BeeGFS CSI driver stopped");
    Ok(())
}

/// Assemble the gRPC services selected by `config.services`
pub fn build_services(
    config: &DriverConfig,
    ctl: Arc<dyn CtlExecutor>,
    mounter: Arc<dyn Mounter>,
) -> CsiServices {
    let plugin_config = Arc::new(config.plugin_config.clone());

    let controller = config.services.controller().then(|| {
        CsiControllerService::new(Arc::new(ControllerService::new(
            ctl,
            mounter.clone(),
            plugin_config.clone(),
            config.client_conf_template_path.clone(),
            config.cs_data_dir.clone(),
        )))
    });

    let node = config.services.node().then(|| {
        CsiNodeService::new(Arc::new(NodeService::new(
            config.node_id.clone(),
            mounter,
            plugin_config,
            config.client_conf_template_path.clone(),
            config.ns_data_dir.clone(),
        )))
    });

    CsiServices {
        identity: CsiIdentityService::new(config.driver_name.clone(), controller.is_some()),
        controller,
        node,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceMode;
    use beegfs_csi_core::domain::plugin_config::PluginConfig;
    use beegfs_csi_core::infrastructure::FakeBeegfs;
    use beegfs_csi_core::presentation::grpc::server::Endpoint;
    use std::time::Duration;

    fn config(services: ServiceMode) -> DriverConfig {
        DriverConfig {
            endpoint: Endpoint::Tcp("127.0.0.1:0".parse().unwrap()),
            driver_name: "beegfs.csi.netapp.com".into(),
            node_id: "node-a".into(),
            services,
            cs_data_dir: "/tmp/cs".into(),
            ns_data_dir: "/tmp/ns".into(),
            client_conf_template_path: "/etc/beegfs/beegfs-client.conf".into(),
            plugin_config: PluginConfig::default(),
            beegfs_ctl_path: "beegfs-ctl".into(),
            ctl_timeout: Duration::from_secs(30),
            metrics_address: None,
        }
    }

    fn build(services: ServiceMode) -> CsiServices {
        let fake = Arc::new(FakeBeegfs::new("/tmp/remote"));
        build_services(&config(services), fake.clone(), fake)
    }

    #[test]
    fn test_build_services_by_mode() {
        let all = build(ServiceMode::All);
        assert!(all.controller.is_some() && all.node.is_some());

        let controller = build(ServiceMode::Controller);
        assert!(controller.controller.is_some() && controller.node.is_none());

        let node = build(ServiceMode::Node);
        assert!(node.controller.is_none() && node.node.is_some());
    }
}
