// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! BeeGFS CSI driver
//!
//! Serves the CSI Identity, Controller and Node services for BeeGFS.
//!
//! # Usage
//!
//! ```bash
//! # Controller sidecar pod
//! beegfs-csi-driver --services controller --endpoint unix:///csi/csi.sock
//!
//! # Node daemonset
//! beegfs-csi-driver --services node --node-id "$KUBE_NODE_NAME"
//! ```

use anyhow::{Context, Result};
use clap::Parser;

use beegfs_csi_driver::config::{DriverArgs, DriverConfig, LogFormat};
use beegfs_csi_driver::daemon::run_driver;

/// BeeGFS Container Storage Interface driver
#[derive(Parser)]
#[command(name = "beegfs-csi-driver")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    driver: DriverArgs,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "CSI_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, env = "CSI_LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    let config = DriverConfig::from_args(cli.driver)?;
    run_driver(config).await
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
