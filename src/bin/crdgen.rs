//! CRD YAML Generator
//!
//! This binary generates the Kubernetes CRD manifest for the custom
//! resources defined by the nfs-server-operator.
//!
//! Usage: cargo run --bin crdgen > deploy/crds/all.yaml

use nfs_server_operator::crd::generate_crds;

fn main() {
    for crd in generate_crds() {
        println!("---");
        print!("{}", crd);
    }
}
