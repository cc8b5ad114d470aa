// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`beegfs-csi-core`)
//!
//! gRPC surface that translates CSI requests into application service
//! calls. No business logic lives here; all real work is delegated to
//! application services in `crate::application`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`grpc`] | gRPC (Tonic) | CSI v1 Identity, Controller and Node services |

pub mod grpc;
