// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! Adapters for the outside world: the `beegfs-ctl` control channel, the
//! host mount table, client configuration files and an in-process fake of
//! all of them for tests.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements the domain's anti-corruption traits

pub mod beegfs_ctl;
pub mod client_conf;
pub mod fake;
pub mod mounter;

pub use beegfs_ctl::BeegfsCtlExecutor;
pub use fake::{FakeBeegfs, FakeOp};
pub use mounter::SystemMounter;
