// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Driver process lifecycle
//!
//! Handles:
//! - Wiring BeeGFS adapters into the Controller and Node services
//! - Prometheus metrics exporter
//! - Graceful shutdown

pub mod server;

pub use server::{build_services, run_driver};
