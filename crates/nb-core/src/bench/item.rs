//! Benchmark item and group definitions.

use crate::flags::FlagQuery;
use crate::predicate::{FlagCheck, OwnershipPredicate, PermissionPredicate, TreeScope};
use nb_common::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Node processes a group can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeProcess {
    Kubelet,
    KubeProxy,
}

impl NodeProcess {
    pub fn default_name(self) -> &'static str {
        match self {
            NodeProcess::Kubelet => "kubelet",
            NodeProcess::KubeProxy => "kube-proxy",
        }
    }
}

impl fmt::Display for NodeProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

/// Names used to locate each node process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessNames {
    pub kubelet: String,
    pub kube_proxy: String,
}

impl Default for ProcessNames {
    fn default() -> Self {
        Self {
            kubelet: NodeProcess::Kubelet.default_name().to_string(),
            kube_proxy: NodeProcess::KubeProxy.default_name().to_string(),
        }
    }
}

impl ProcessNames {
    pub fn name(&self, process: NodeProcess) -> &str {
        match process {
            NodeProcess::Kubelet => &self.kubelet,
            NodeProcess::KubeProxy => &self.kube_proxy,
        }
    }
}

/// What the items of a group are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// The file named by a flag of the group's process.
    FlagPath(FlagQuery),
    /// A fixed file.
    Path(PathBuf),
    /// Every entry under a fixed directory.
    Tree { root: PathBuf, scope: TreeScope },
    /// The group's process's flags themselves.
    Flags,
}

impl Subject {
    /// True if this subject needs a located process.
    pub fn needs_process(&self) -> bool {
        matches!(self, Subject::FlagPath(_) | Subject::Flags)
    }

    /// True if `check` can be evaluated against this subject.
    pub fn accepts(&self, check: &Check) -> bool {
        match (self, check) {
            (Subject::Flags, Check::Flag(_)) => true,
            (Subject::Flags, _) | (_, Check::Flag(_)) => false,
            _ => true,
        }
    }
}

/// The predicate an item applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Permissions(PermissionPredicate),
    Ownership(OwnershipPredicate),
    Flag(FlagCheck),
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Permissions(p) => write!(f, "{}", p),
            Check::Ownership(o) => write!(f, "{}", o),
            Check::Flag(c) => write!(f, "--{} {}", c.flag, c.predicate),
        }
    }
}

/// One numbered benchmark item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub id: ItemId,
    pub title: String,
    pub scored: bool,
    pub check: Check,
}

impl CheckItem {
    pub fn scored(id: impl Into<ItemId>, title: impl Into<String>, check: Check) -> Self {
        Self::new(id, title, true, check)
    }

    pub fn not_scored(id: impl Into<ItemId>, title: impl Into<String>, check: Check) -> Self {
        Self::new(id, title, false, check)
    }

    fn new(id: impl Into<ItemId>, title: impl Into<String>, scored: bool, check: Check) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            scored,
            check,
        }
    }

    /// `[id] title`, the string focus patterns match against.
    pub fn label(&self) -> String {
        format!("[{}] {}", self.id, self.title)
    }
}

/// Items sharing a process and a subject, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckGroup {
    pub process: Option<NodeProcess>,
    pub subject: Subject,
    pub items: Vec<CheckItem>,
}

impl CheckGroup {
    pub fn new(process: Option<NodeProcess>, subject: Subject) -> Self {
        Self {
            process,
            subject,
            items: Vec::new(),
        }
    }

    pub fn item(mut self, item: CheckItem) -> Self {
        self.items.push(item);
        self
    }
}
