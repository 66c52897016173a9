//! Ganesha configuration rendering and the ConfigMap carrying it

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crate::crd::NfsServer;

use super::owner_references;

// Export_Id needs to be unique for each export on the server node.
const EXPORT_ID_BASE: i32 = 57;

/// ConfigMap holding the ganesha configuration, named after the server and
/// keyed by the server name.
pub fn config_map(nfs: &NfsServer) -> ConfigMap {
    let name = nfs.name_any();
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: nfs.namespace(),
            owner_references: owner_references(nfs),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(name, render_config(nfs))])),
        ..Default::default()
    }
}

/// Render the full ganesha configuration for a server: the global section,
/// the logging section, and one EXPORT block per export. When the spec
/// lists no exports, a single default export is rendered for the owning
/// name with read-write access and no squashing.
pub fn render_config(nfs: &NfsServer) -> String {
    let mut id = EXPORT_ID_BASE;

    let mut exports = Vec::new();
    if nfs.spec.exports.is_empty() {
        exports.push(export_config(id, &nfs.name_any(), "readwrite", "none"));
    }

    for export in &nfs.spec.exports {
        exports.push(export_config(
            id,
            &export.persistent_volume_claim.claim_name,
            &export.server.access_mode,
            &export.server.squash,
        ));
        id += 1;
    }

    format!("{}{}{}", global_config(), log_config(), exports.join("\n"))
}

fn export_config(id: i32, reference: &str, access: &str, squash: &str) -> String {
    format!(
        r#"
EXPORT {{
	Export_Id = {id};
	Path = /export/{reference};
	Pseudo = /{reference};
	Protocols = 4;
	Transports = TCP;
	Sectype = sys;
	Access_Type = {access};
	Squash = {squash};
	FSAL {{
		Name = VFS;
	}}
}}
"#,
        id = id,
        reference = reference,
        access = access_type(access),
        squash = squash_mode(squash),
    )
}

fn global_config() -> &'static str {
    r#"
NFS_Core_Param {
	fsid_device = true;
}"#
}

// TODO: use default "EVENT" level.
fn log_config() -> &'static str {
    r#"
LOG {
	default_log_level = DEBUG;
	Components {
		ALL = DEBUG;
	}
}"#
}

/// Translate the spec access mode into ganesha's Access_Type vocabulary.
/// Unrecognized values fall back to read-write.
fn access_type(mode: &str) -> &'static str {
    match mode.to_lowercase().as_str() {
        "none" => "None",
        "readonly" => "RO",
        _ => "RW",
    }
}

fn squash_mode(squash: &str) -> String {
    if squash.is_empty() {
        "none".to_string()
    } else {
        squash.to_lowercase()
    }
}
