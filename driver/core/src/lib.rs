// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! BeeGFS CSI Core
//!
//! Volume lifecycle for BeeGFS directory volumes exposed through the
//! Container Storage Interface.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services, adapters and CSI gRPC services

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
