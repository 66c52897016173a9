//! Tests for the dependent resource builders
//!
//! These verify that a given NfsServer spec always maps to the expected
//! Service, ConfigMap, StatefulSet and PersistentVolumeClaim, and that the
//! mapping is deterministic.

use k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use nfs_server_operator::crd::{
    ExportSpec, NfsServer, NfsServerSpec, ServerSpec, DEFAULT_NFS_CONTAINER_IMAGE,
};
use nfs_server_operator::resources::{
    config_map, render_config, service, stateful_set, volume_claim, DEFAULT_METRICS_PORT,
    DEFAULT_NFS_PORT, DEFAULT_RPC_PORT,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn default_metadata(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some("default".to_string()),
        uid: Some("f8c1e2aa-4656-4b23-a8b0-67d247e0a2a5".to_string()),
        ..Default::default()
    }
}

fn create_server(spec: NfsServerSpec) -> NfsServer {
    NfsServer {
        metadata: default_metadata("test-nfs"),
        spec,
        status: None,
    }
}

fn export(name: &str, claim: &str, access: &str, squash: &str) -> ExportSpec {
    ExportSpec {
        name: name.to_string(),
        server: ServerSpec {
            access_mode: access.to_string(),
            squash: squash.to_string(),
            allowed_clients: vec![],
        },
        persistent_volume_claim: PersistentVolumeClaimVolumeSource {
            claim_name: claim.to_string(),
            read_only: None,
        },
    }
}

// ============================================================================
// Config Rendering Tests
// ============================================================================

#[test]
fn empty_exports_render_one_default_export_block() {
    let nfs = create_server(NfsServerSpec::default());
    let config = render_config(&nfs);

    assert_eq!(config.matches("EXPORT {").count(), 1);
    assert!(config.contains("Export_Id = 57;"));
    assert!(config.contains("Path = /export/test-nfs;"));
    assert!(config.contains("Pseudo = /test-nfs;"));
    assert!(config.contains("Access_Type = RW;"));
    assert!(config.contains("Squash = none;"));
}

#[test]
fn export_identifiers_increase_in_spec_order() {
    let nfs = create_server(NfsServerSpec {
        exports: vec![
            export("share-a", "claim-a", "ReadWrite", ""),
            export("share-b", "claim-b", "ReadOnly", "root"),
        ],
        ..Default::default()
    });
    let config = render_config(&nfs);

    assert_eq!(config.matches("EXPORT {").count(), 2);
    assert!(config.contains("Export_Id = 57;"));
    assert!(config.contains("Export_Id = 58;"));

    // Paths come from the referenced claims, not the export names.
    assert!(config.contains("Path = /export/claim-a;"));
    assert!(config.contains("Path = /export/claim-b;"));
    assert!(!config.contains("share-a"));

    // Identifier order follows spec order.
    let first = config.find("claim-a").unwrap();
    let second = config.find("claim-b").unwrap();
    assert!(first < second);
}

#[test]
fn access_modes_translate_to_ganesha_vocabulary() {
    let cases = vec![
        ("None", "Access_Type = None;"),
        ("none", "Access_Type = None;"),
        ("ReadOnly", "Access_Type = RO;"),
        ("readonly", "Access_Type = RO;"),
        ("ReadWrite", "Access_Type = RW;"),
        ("", "Access_Type = RW;"),
    ];

    for (mode, expected) in cases {
        let nfs = create_server(NfsServerSpec {
            exports: vec![export("share", "claim", mode, "")],
            ..Default::default()
        });
        let config = render_config(&nfs);
        assert!(
            config.contains(expected),
            "access mode '{}' should render '{}'",
            mode,
            expected
        );
    }
}

#[test]
fn squash_is_lowercased_and_defaults_to_none() {
    let cases = vec![
        ("", "Squash = none;"),
        ("Root", "Squash = root;"),
        ("ROOTID", "Squash = rootid;"),
        ("all", "Squash = all;"),
    ];

    for (squash, expected) in cases {
        let nfs = create_server(NfsServerSpec {
            exports: vec![export("share", "claim", "", squash)],
            ..Default::default()
        });
        let config = render_config(&nfs);
        assert!(
            config.contains(expected),
            "squash '{}' should render '{}'",
            squash,
            expected
        );
    }
}

#[test]
fn config_carries_global_and_log_sections() {
    let nfs = create_server(NfsServerSpec::default());
    let config = render_config(&nfs);

    assert!(config.contains("NFS_Core_Param {"));
    assert!(config.contains("fsid_device = true;"));
    assert!(config.contains("LOG {"));
    assert!(config.contains("default_log_level = DEBUG;"));
}

#[test]
fn config_map_is_named_after_the_server_and_keyed_by_it() {
    let nfs = create_server(NfsServerSpec::default());
    let cm = config_map(&nfs);

    assert_eq!(cm.metadata.name.as_deref(), Some("test-nfs"));
    assert_eq!(cm.metadata.namespace.as_deref(), Some("default"));

    let data = cm.data.unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data["test-nfs"], render_config(&nfs));
}

// ============================================================================
// Service Tests
// ============================================================================

#[test]
fn service_exposes_the_three_named_ports() {
    let nfs = create_server(NfsServerSpec::default());
    let svc = service(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);

    let spec = svc.spec.unwrap();
    assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));

    let ports = spec.ports.unwrap();
    let named: Vec<(Option<&str>, i32)> = ports
        .iter()
        .map(|p| (p.name.as_deref(), p.port))
        .collect();
    assert_eq!(
        named,
        vec![(Some("nfs"), 2049), (Some("rpc"), 111), (Some("metrics"), 9587)]
    );
}

#[test]
fn service_selects_pods_labelled_with_the_owning_name() {
    let nfs = create_server(NfsServerSpec::default());
    let svc = service(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);

    let selector = svc.spec.unwrap().selector.unwrap();
    assert_eq!(selector["nfs_server_cr"], "test-nfs");
    assert_eq!(selector["app"], "nfs-server");
}

// ============================================================================
// StatefulSet Tests
// ============================================================================

#[test]
fn stateful_set_requests_exactly_one_replica() {
    let nfs = create_server(NfsServerSpec::default());
    let ss = stateful_set(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);

    let spec = ss.spec.unwrap();
    assert_eq!(spec.replicas, Some(1));
    assert_eq!(spec.service_name, "test-nfs");
}

#[test]
fn stateful_set_uses_the_default_image_when_unset() {
    let nfs = create_server(NfsServerSpec::default());
    let ss = stateful_set(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);

    let pod_spec = ss.spec.unwrap().template.spec.unwrap();
    let container = &pod_spec.containers[0];
    assert_eq!(container.name, "ganesha");
    assert_eq!(container.image.as_deref(), Some(DEFAULT_NFS_CONTAINER_IMAGE));
}

#[test]
fn stateful_set_uses_the_spec_image_when_set() {
    let nfs = create_server(NfsServerSpec {
        nfs_container: "registry.example.com/ganesha:v5".to_string(),
        ..Default::default()
    });
    let ss = stateful_set(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);

    let pod_spec = ss.spec.unwrap().template.spec.unwrap();
    let container = &pod_spec.containers[0];
    assert_eq!(
        container.image.as_deref(),
        Some("registry.example.com/ganesha:v5")
    );
}

#[test]
fn stateful_set_requires_mount_and_read_bypass_capabilities() {
    let nfs = create_server(NfsServerSpec::default());
    let ss = stateful_set(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);

    let pod_spec = ss.spec.unwrap().template.spec.unwrap();
    let container = &pod_spec.containers[0];
    let add = container
        .security_context
        .as_ref()
        .unwrap()
        .capabilities
        .as_ref()
        .unwrap()
        .add
        .clone()
        .unwrap();
    assert_eq!(add, vec!["SYS_ADMIN".to_string(), "DAC_READ_SEARCH".to_string()]);
}

#[test]
fn stateful_set_mounts_config_and_data_volumes() {
    let nfs = create_server(NfsServerSpec::default());
    let ss = stateful_set(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);

    let pod_spec = ss.spec.unwrap().template.spec.unwrap();

    let container = &pod_spec.containers[0];
    let env = container.env.as_ref().unwrap();
    assert_eq!(env[0].name, "GANESHA_CONFIGFILE");
    assert_eq!(env[0].value.as_deref(), Some("/config/test-nfs"));

    let mounts: Vec<(&str, &str)> = container
        .volume_mounts
        .as_ref()
        .unwrap()
        .iter()
        .map(|m| (m.name.as_str(), m.mount_path.as_str()))
        .collect();
    assert_eq!(mounts, vec![("nfs-config", "/config"), ("nfs-data", "/export")]);

    let volumes = pod_spec.volumes.unwrap();
    assert_eq!(
        volumes[0].config_map.as_ref().unwrap().name,
        "test-nfs"
    );
    assert_eq!(
        volumes[1].persistent_volume_claim.as_ref().unwrap().claim_name,
        "test-nfs"
    );
}

#[test]
fn stateful_set_exposes_the_three_container_ports() {
    let nfs = create_server(NfsServerSpec::default());
    let ss = stateful_set(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);

    let pod_spec = ss.spec.unwrap().template.spec.unwrap();
    let container = &pod_spec.containers[0];
    let ports: Vec<(Option<&str>, i32)> = container
        .ports
        .as_ref()
        .unwrap()
        .iter()
        .map(|p| (p.name.as_deref(), p.container_port))
        .collect();
    assert_eq!(
        ports,
        vec![
            (Some("nfs-port"), 2049),
            (Some("rpc-port"), 111),
            (Some("metrics-port"), 9587),
        ]
    );
}

#[test]
fn stateful_set_passes_spec_annotations_to_the_pod_template() {
    let nfs = create_server(NfsServerSpec {
        annotations: [("example.com/scrape".to_string(), "true".to_string())].into(),
        ..Default::default()
    });
    let ss = stateful_set(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);

    let annotations = ss
        .spec
        .unwrap()
        .template
        .metadata
        .unwrap()
        .annotations
        .unwrap();
    assert_eq!(annotations["example.com/scrape"], "true");
}

// ============================================================================
// Volume Claim Tests
// ============================================================================

#[test]
fn volume_claim_requests_the_default_size_when_unset() {
    let nfs = create_server(NfsServerSpec::default());
    let pvc = volume_claim(&nfs);

    let requests = pvc.spec.unwrap().resources.unwrap().requests.unwrap();
    assert_eq!(requests["storage"], Quantity("5Gi".to_string()));
}

#[test]
fn volume_claim_requests_the_spec_size_when_set() {
    let nfs = create_server(NfsServerSpec {
        size: "100Gi".to_string(),
        ..Default::default()
    });
    let pvc = volume_claim(&nfs);

    let requests = pvc.spec.unwrap().resources.unwrap().requests.unwrap();
    assert_eq!(requests["storage"], Quantity("100Gi".to_string()));
}

#[test]
fn volume_claim_is_read_write_once() {
    let nfs = create_server(NfsServerSpec::default());
    let pvc = volume_claim(&nfs);

    let spec = pvc.spec.unwrap();
    assert_eq!(spec.access_modes, Some(vec!["ReadWriteOnce".to_string()]));
    assert_eq!(spec.storage_class_name.as_deref(), Some("fast"));
}

// ============================================================================
// Cross-Cutting Tests
// ============================================================================

#[test]
fn all_dependents_carry_a_controller_owner_reference() {
    let nfs = create_server(NfsServerSpec::default());

    let owners = vec![
        config_map(&nfs).metadata.owner_references,
        service(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT)
            .metadata
            .owner_references,
        stateful_set(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT)
            .metadata
            .owner_references,
        volume_claim(&nfs).metadata.owner_references,
    ];

    for refs in owners {
        let refs = refs.expect("owner references should be set");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, "NfsServer");
        assert_eq!(refs[0].name, "test-nfs");
        assert_eq!(refs[0].controller, Some(true));
    }
}

#[test]
fn synthesis_is_deterministic() {
    let nfs = create_server(NfsServerSpec {
        size: "20Gi".to_string(),
        exports: vec![
            export("share-a", "claim-a", "ReadOnly", "rootid"),
            export("share-b", "claim-b", "", ""),
        ],
        ..Default::default()
    });

    assert_eq!(render_config(&nfs), render_config(&nfs));
    assert_eq!(config_map(&nfs), config_map(&nfs));
    assert_eq!(volume_claim(&nfs), volume_claim(&nfs));
    assert_eq!(
        service(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT),
        service(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT)
    );
    assert_eq!(
        stateful_set(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT),
        stateful_set(&nfs, DEFAULT_NFS_PORT, DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT)
    );
}
