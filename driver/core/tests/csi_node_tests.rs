// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CSI Node service tests
//!
//! Publishes a volume created through the Controller service onto a target
//! path and unpublishes it again, all against `FakeBeegfs`.

use beegfs_csi_core::application::controller::ControllerService;
use beegfs_csi_core::application::node::NodeService;
use beegfs_csi_core::domain::plugin_config::PluginConfig;
use beegfs_csi_core::infrastructure::fake::FakeBeegfs;
use beegfs_csi_core::presentation::grpc::controller::CsiControllerService;
use beegfs_csi_core::presentation::grpc::csi::controller_server::Controller;
use beegfs_csi_core::presentation::grpc::csi::node_server::Node;
use beegfs_csi_core::presentation::grpc::csi::volume_capability::access_mode::Mode;
use beegfs_csi_core::presentation::grpc::csi::*;
use beegfs_csi_core::presentation::grpc::node::CsiNodeService;
use std::collections::HashMap;
use std::sync::Arc;
use tonic::{Code, Request};

struct Harness {
    dir: tempfile::TempDir,
    fake: Arc<FakeBeegfs>,
    controller: CsiControllerService,
    node: CsiNodeService,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("beegfs-client.conf");
        std::fs::write(&template, "sysMgmtdHost =\n").unwrap();

        let fake = Arc::new(FakeBeegfs::new(dir.path().join("remote")));
        let config = Arc::new(PluginConfig::default());

        let controller = ControllerService::new(
            fake.clone(),
            fake.clone(),
            config.clone(),
            &template,
            dir.path().join("controller"),
        );
        let node = NodeService::new(
            "node-a",
            fake.clone(),
            config,
            &template,
            dir.path().join("node"),
        );

        Self {
            dir,
            fake,
            controller: CsiControllerService::new(Arc::new(controller)),
            node: CsiNodeService::new(Arc::new(node)),
        }
    }

    fn target(&self, pod: &str) -> String {
        self.dir
            .path()
            .join("kubelet/pods")
            .join(pod)
            .join("volumes/mount")
            .display()
            .to_string()
    }

    async fn create_volume(&self, name: &str) -> String {
        let parameters: HashMap<String, String> = [
            ("sysMgmtdHost".to_string(), "10.0.0.1".to_string()),
            ("volDirBasePath".to_string(), "/scratch".to_string()),
        ]
        .into_iter()
        .collect();

        self.controller
            .create_volume(Request::new(CreateVolumeRequest {
                name: name.to_string(),
                volume_capabilities: vec![capability(Mode::MultiNodeMultiWriter)],
                parameters,
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner()
            .volume
            .unwrap()
            .volume_id
    }
}

fn capability(mode: Mode) -> VolumeCapability {
    VolumeCapability {
        access_type: Some(volume_capability::AccessType::Mount(
            volume_capability::MountVolume::default(),
        )),
        access_mode: Some(volume_capability::AccessMode { mode: mode as i32 }),
    }
}

fn publish_request(volume_id: &str, target: &str) -> NodePublishVolumeRequest {
    NodePublishVolumeRequest {
        volume_id: volume_id.to_string(),
        target_path: target.to_string(),
        volume_capability: Some(capability(Mode::MultiNodeMultiWriter)),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_publish_two_pods_then_unpublish() {
    let h = Harness::new();
    let volume_id = h.create_volume("pvc-1").await;
    let (a, b) = (h.target("a"), h.target("b"));

    for target in [&a, &b] {
        h.node
            .node_publish_volume(Request::new(publish_request(&volume_id, target)))
            .await
            .unwrap();
    }

    std::fs::write(format!("{}/shared.txt", a), b"from a").unwrap();
    assert_eq!(std::fs::read(format!("{}/shared.txt", b)).unwrap(), b"from a");
    assert_eq!(h.fake.active_mounts().len(), 4);

    h.node
        .node_unpublish_volume(Request::new(NodeUnpublishVolumeRequest {
            volume_id: volume_id.clone(),
            target_path: a.clone(),
        }))
        .await
        .unwrap();

    // Pod b keeps its own BeeGFS mount.
    assert_eq!(h.fake.active_mounts().len(), 2);
    assert!(std::path::Path::new(&b).join("shared.txt").is_file());

    for _ in 0..2 {
        h.node
            .node_unpublish_volume(Request::new(NodeUnpublishVolumeRequest {
                volume_id: volume_id.clone(),
                target_path: b.clone(),
            }))
            .await
            .unwrap();
    }
    assert!(h.fake.active_mounts().is_empty());
    assert!(h.fake.remote_path("/scratch/pvc-1/shared.txt").is_file());
}

#[tokio::test]
async fn test_publish_argument_errors() {
    let h = Harness::new();
    let target = h.target("a");

    let mut no_capability = publish_request("beegfs://10.0.0.1/scratch/pvc-1", &target);
    no_capability.volume_capability = None;

    for request in [
        publish_request("", &target),
        publish_request("beegfs://10.0.0.1/scratch/pvc-1", ""),
        no_capability,
    ] {
        let status = h
            .node
            .node_publish_volume(Request::new(request))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    let status = h
        .node
        .node_unpublish_volume(Request::new(NodeUnpublishVolumeRequest {
            volume_id: "beegfs://10.0.0.1/scratch/pvc-1".into(),
            target_path: String::new(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_node_info_and_capabilities() {
    let h = Harness::new();

    let info = h
        .node
        .node_get_info(Request::new(NodeGetInfoRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(info.node_id, "node-a");

    let caps = h
        .node
        .node_get_capabilities(Request::new(NodeGetCapabilitiesRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert!(caps.capabilities.is_empty());
}

#[tokio::test]
async fn test_node_unimplemented_rpcs() {
    let h = Harness::new();
    let n = &h.node;

    let codes = vec![
        n.node_stage_volume(Request::new(Default::default())).await.unwrap_err().code(),
        n.node_unstage_volume(Request::new(Default::default())).await.unwrap_err().code(),
        n.node_get_volume_stats(Request::new(Default::default())).await.unwrap_err().code(),
        n.node_expand_volume(Request::new(Default::default())).await.unwrap_err().code(),
    ];
    assert!(codes.iter().all(|code| *code == Code::Unimplemented));
}
