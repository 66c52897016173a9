//! Kubernetes controller for the NfsServer CRD
//!
//! This module contains the controller implementation that watches
//! NfsServer objects and their owned dependents and triggers
//! reconciliation. The controller runtime serializes reconciles per
//! object; distinct objects reconcile in parallel.

mod nfs_server_controller;

pub use nfs_server_controller::run as run_nfs_server_controller;

use kube::runtime::events::{Recorder, Reporter};
use kube::{Client, Resource};

use crate::crd::NfsServer;

/// Shared context for the controller
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Identity events are reported under
    pub reporter: Reporter,
}

impl Context {
    /// Create a new context
    pub fn new(client: Client) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: "nfs-server-operator".into(),
                instance: std::env::var("HOSTNAME").ok(),
            },
        }
    }

    /// Event recorder publishing against the given server object
    pub fn recorder(&self, nfs: &NfsServer) -> Recorder {
        Recorder::new(self.client.clone(), self.reporter.clone(), nfs.object_ref(&()))
    }
}
