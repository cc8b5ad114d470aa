// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! Use cases of the driver: the volume lifecycle controller, the node
//! publisher and the local scaffolding both of them share.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates domain objects and infrastructure adapters

pub mod controller;
pub mod node;
pub mod scaffold;
