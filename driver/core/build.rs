// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Build Script for beegfs-csi-core
//!
//! Compiles the vendored Container Storage Interface definition
//! (`../../proto/csi.proto`, package `csi.v1`) into tonic server and client
//! stubs. Generated code is placed in `OUT_DIR` and included via
//! `tonic::include_proto!` in the `csi` module of
//! `src/presentation/grpc/mod.rs`.
//!
//! `protoc` and the well-known type includes come from
//! `protoc-bin-vendored`, so no system protobuf installation is needed.

use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    let proto_root = PathBuf::from("../../proto");
    let csi_proto = proto_root.join("csi.proto");
    let well_known = protoc_bin_vendored::include_path()?;

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&[csi_proto], &[proto_root, well_known])?;

    println!("cargo:rerun-if-changed=../../proto/csi.proto");

    Ok(())
}
