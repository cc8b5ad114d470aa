// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Volume identity, request parameters, capability rules and the traits
//! standing in for the BeeGFS control channel and the host mount table.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure value objects and anti-corruption traits

pub mod capability;
pub mod ctl;
pub mod mount;
pub mod plugin_config;
pub mod stripe;
pub mod volume;
