// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! gRPC Server
//!
//! Serves the CSI services on the endpoint handed to the driver by the
//! container orchestrator, usually a unix socket shared with the sidecars.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tracing::info;

use super::controller::CsiControllerService;
use super::identity::CsiIdentityService;
use super::node::CsiNodeService;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("endpoint {0:?} must start with unix:// or tcp://")]
    UnknownScheme(String),

    #[error("unix endpoint {0:?} must name an absolute socket path")]
    InvalidSocketPath(String),

    #[error("tcp endpoint {0:?} must be host:port")]
    InvalidAddress(String),
}

/// Where the CSI services listen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix://") {
            if !path.starts_with('/') {
                return Err(EndpointError::InvalidSocketPath(s.to_string()));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = s.strip_prefix("tcp://") {
            return addr
                .parse()
                .map(Endpoint::Tcp)
                .map_err(|_| EndpointError::InvalidAddress(s.to_string()));
        }
        Err(EndpointError::UnknownScheme(s.to_string()))
    }
}

/// Services this process serves; Identity is always present
pub struct CsiServices {
    pub identity: CsiIdentityService,
    pub controller: Option<CsiControllerService>,
    pub node: Option<CsiNodeService>,
}

/// Serve `services` on `endpoint` until `shutdown` resolves
pub async fn serve<F>(endpoint: Endpoint, services: CsiServices, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send,
{
    let router = Server::builder()
        .add_service(services.identity.into_server())
        .add_optional_service(services.controller.map(CsiControllerService::into_server))
        .add_optional_service(services.node.map(CsiNodeService::into_server));

    match endpoint {
        Endpoint::Unix(path) => {
            // A socket left behind by a previous run would make bind fail.
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let listener = UnixListener::bind(&path)?;
            info!("Starting CSI gRPC server on unix://{}", path.display());

            router
                .serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown)
                .await?;

            let _ = tokio::fs::remove_file(&path).await;
        }
        Endpoint::Tcp(addr) => {
            info!("Starting CSI gRPC server on tcp://{}", addr);
            router.serve_with_shutdown(addr, shutdown).await?;
        }
    }

    info!("CSI gRPC server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoints() {
        assert_eq!(
            "unix:///csi/csi.sock".parse::<Endpoint>(),
            Ok(Endpoint::Unix(PathBuf::from("/csi/csi.sock")))
        );
        assert_eq!(
            "tcp://127.0.0.1:10000".parse::<Endpoint>(),
            Ok(Endpoint::Tcp("127.0.0.1:10000".parse().unwrap()))
        );
    }

    #[test]
    fn test_parse_endpoint_errors() {
        assert!(matches!(
            "/csi/csi.sock".parse::<Endpoint>(),
            Err(EndpointError::UnknownScheme(_))
        ));
        assert!(matches!(
            "unix://csi.sock".parse::<Endpoint>(),
            Err(EndpointError::InvalidSocketPath(_))
        ));
        assert!(matches!(
            "tcp://localhost".parse::<Endpoint>(),
            Err(EndpointError::InvalidAddress(_))
        ));
    }
}
