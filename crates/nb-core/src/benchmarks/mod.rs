//! CIS Kubernetes node benchmark content.
//!
//! - [`kubelet`]: section 2.1, kubelet argument checks
//! - [`configuration_files`]: section 2.2, configuration file permissions
//!   and ownership

pub mod configuration_files;
pub mod kubelet;

use crate::bench::{Focus, Registry, RegistryError};
use nb_common::ItemId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location of kubelet systemd drop-ins.
pub const KUBELET_SERVICE_DIR: &str = "/etc/systemd/system/kubelet.service.d";

/// Host paths the benchmark content refers to directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchPaths {
    pub kubelet_service_dir: PathBuf,
}

impl Default for BenchPaths {
    fn default() -> Self {
        Self {
            kubelet_service_dir: PathBuf::from(KUBELET_SERVICE_DIR),
        }
    }
}

/// Subsets of the node benchmark selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Everything.
    Node,
    /// Kubelet arguments.
    Kubelet,
    /// kube-proxy kubeconfig file.
    Proxy,
    /// All configuration file checks.
    Files,
}

impl Family {
    /// Sections this family selects. Empty means all.
    pub fn sections(self) -> Vec<ItemId> {
        match self {
            Family::Node => Vec::new(),
            Family::Kubelet => vec![ItemId::from([2, 1])],
            Family::Proxy => vec![ItemId::from([2, 2, 5]), ItemId::from([2, 2, 6])],
            Family::Files => vec![ItemId::from([2, 2])],
        }
    }

    pub fn focus(self) -> Focus {
        Focus::sections(self.sections())
    }
}

/// The full node benchmark: section 2.1, then section 2.2.
pub fn node_registry(paths: &BenchPaths) -> Result<Registry, RegistryError> {
    let mut groups = kubelet::groups();
    groups.extend(configuration_files::groups(paths));
    Registry::new(groups)
}
