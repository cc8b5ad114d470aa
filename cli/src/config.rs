// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Driver Configuration
//!
//! Command line flags (with environment fallbacks) and the validated,
//! immutable [`DriverConfig`] built from them once at startup.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use beegfs_csi_core::domain::plugin_config::PluginConfig;
use beegfs_csi_core::infrastructure::beegfs_ctl::DEFAULT_CTL_PATH;
use beegfs_csi_core::infrastructure::client_conf::DEFAULT_CLIENT_CONF_TEMPLATE_PATH;
use beegfs_csi_core::presentation::grpc::server::Endpoint;

/// Which CSI services this process serves (Identity is always served)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceMode {
    Controller,
    Node,
    All,
}

impl ServiceMode {
    pub fn controller(self) -> bool {
        matches!(self, ServiceMode::Controller | ServiceMode::All)
    }

    pub fn node(self) -> bool {
        matches!(self, ServiceMode::Node | ServiceMode::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct DriverArgs {
    /// CSI endpoint (unix:///path/to/csi.sock or tcp://host:port)
    #[arg(long, env = "CSI_ENDPOINT", default_value = "unix:///csi/csi.sock")]
    pub endpoint: String,

    /// Name reported by GetPluginInfo
    #[arg(long, env = "CSI_DRIVER_NAME", default_value = "beegfs.csi.netapp.com")]
    pub driver_name: String,

    /// Node identifier reported by NodeGetInfo
    #[arg(long, env = "CSI_NODE_ID", default_value = "")]
    pub node_id: String,

    /// Services to run in this process
    #[arg(long, value_enum, env = "CSI_SERVICES", default_value = "all")]
    pub services: ServiceMode,

    /// Directory for controller-side anchor directories
    #[arg(long, env = "CSI_CS_DATA_DIR", default_value = "/var/lib/beegfs-csi/controller", value_name = "DIR")]
    pub cs_data_dir: PathBuf,

    /// Directory for node-side anchor directories
    #[arg(long, env = "CSI_NS_DATA_DIR", default_value = "/var/lib/beegfs-csi/node", value_name = "DIR")]
    pub ns_data_dir: PathBuf,

    /// Stock beegfs-client.conf used as the template for every volume
    #[arg(long, env = "CSI_CLIENT_CONF_TEMPLATE_PATH", default_value = DEFAULT_CLIENT_CONF_TEMPLATE_PATH, value_name = "FILE")]
    pub client_conf_template_path: PathBuf,

    /// Plugin configuration YAML (client network settings per file system)
    #[arg(long, env = "CSI_CONFIG_PATH", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// beegfs-ctl executable
    #[arg(long, env = "CSI_BEEGFS_CTL_PATH", default_value = DEFAULT_CTL_PATH, value_name = "FILE")]
    pub beegfs_ctl_path: PathBuf,

    /// Timeout for a single beegfs-ctl invocation, in seconds
    #[arg(long, env = "CSI_CTL_TIMEOUT_SECS", default_value = "30")]
    pub ctl_timeout_secs: u64,

    /// Serve Prometheus metrics on this address (disabled when unset)
    #[arg(long, env = "CSI_METRICS_ADDRESS", value_name = "ADDR")]
    pub metrics_address: Option<SocketAddr>,
}

/// Validated, process-wide driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub endpoint: Endpoint,
    pub driver_name: String,
    pub node_id: String,
    pub services: ServiceMode,
    pub cs_data_dir: PathBuf,
    pub ns_data_dir: PathBuf,
    pub client_conf_template_path: PathBuf,
    pub plugin_config: PluginConfig,
    pub beegfs_ctl_path: PathBuf,
    pub ctl_timeout: Duration,
    pub metrics_address: Option<SocketAddr>,
}

impl DriverConfig {
    pub fn from_args(args: DriverArgs) -> Result<Self> {
        if args.driver_name.is_empty() {
            bail!("--driver-name cannot be empty");
        }
        if args.services.node() && args.node_id.is_empty() {
            bail!("--node-id is required when the node service is enabled");
        }
        if args.ctl_timeout_secs == 0 {
            bail!("--ctl-timeout-secs must be greater than zero");
        }

        let endpoint: Endpoint = args
            .endpoint
            .parse()
            .with_context(|| format!("Invalid --endpoint {}", args.endpoint))?;

        let plugin_config = PluginConfig::load_or_default(args.config_path.clone())
            .context("Failed to load plugin configuration")?;
        plugin_config
            .validate()
            .context("Invalid plugin configuration")?;

        Ok(Self {
            endpoint,
            driver_name: args.driver_name,
            node_id: args.node_id,
            services: args.services,
            cs_data_dir: args.cs_data_dir,
            ns_data_dir: args.ns_data_dir,
            client_conf_template_path: args.client_conf_template_path,
            plugin_config,
            beegfs_ctl_path: args.beegfs_ctl_path,
            ctl_timeout: Duration::from_secs(args.ctl_timeout_secs),
            metrics_address: args.metrics_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        driver: DriverArgs,
    }

    fn parse(args: &[&str]) -> DriverArgs {
        let mut argv = vec!["beegfs-csi-driver"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().driver
    }

    fn with_empty_config(args: &[&str]) -> (tempfile::NamedTempFile, DriverArgs) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut driver = parse(args);
        driver.config_path = Some(file.path().to_path_buf());
        (file, driver)
    }

    #[test]
    fn test_controller_only() {
        let (_file, args) = with_empty_config(&[
            "--services",
            "controller",
            "--endpoint",
            "tcp://127.0.0.1:9820",
        ]);
        let config = DriverConfig::from_args(args).unwrap();

        assert_eq!(config.endpoint, Endpoint::Tcp("127.0.0.1:9820".parse().unwrap()));
        assert!(config.services.controller());
        assert!(!config.services.node());
        assert_eq!(config.ctl_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_node_requires_node_id() {
        let (_file, args) = with_empty_config(&["--services", "node"]);
        let err = DriverConfig::from_args(args).unwrap_err();
        assert!(err.to_string().contains("--node-id"));
    }

    #[test]
    fn test_invalid_endpoint() {
        let (_file, args) = with_empty_config(&[
            "--services",
            "controller",
            "--endpoint",
            "/csi/csi.sock",
        ]);
        assert!(DriverConfig::from_args(args).is_err());
    }

    #[test]
    fn test_invalid_plugin_config_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "config:\n  beegfsClientConf:\n    connNetFilterFile: /x").unwrap();

        let mut args = parse(&["--services", "controller"]);
        args.config_path = Some(file.path().to_path_buf());

        let err = DriverConfig::from_args(args).unwrap_err();
        assert!(format!("{:#}", err).contains("connNetFilterFile"));
    }
}
