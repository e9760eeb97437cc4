//! Section 2.2: worker node configuration files.

use super::BenchPaths;
use crate::bench::{Check, CheckGroup, CheckItem, NodeProcess, Subject};
use crate::flags::{BaseDir, FlagQuery};
use crate::predicate::{OwnershipPredicate, PermissionPredicate, TreeScope};

/// Most permissive mode any of these files may have.
pub const MAX_MODE: u32 = 0o644;

fn perms() -> Check {
    Check::Permissions(PermissionPredicate::at_most(MAX_MODE))
}

fn root_owned() -> Check {
    Check::Ownership(OwnershipPredicate::root())
}

/// Item groups for section 2.2, in declaration order.
pub fn groups(paths: &BenchPaths) -> Vec<CheckGroup> {
    vec![
        CheckGroup::new(
            Some(NodeProcess::Kubelet),
            Subject::FlagPath(FlagQuery::new("kubeconfig").base(BaseDir::Unset)),
        )
        .item(CheckItem::scored(
            [2, 2, 1],
            "Ensure that the kubelet.conf file permissions are set to 644 or more restrictive",
            perms(),
        ))
        .item(CheckItem::scored(
            [2, 2, 2],
            "Ensure that the kubelet.conf file ownership is set to root:root",
            root_owned(),
        )),
        // The service dir is only meaningful on a node running the kubelet.
        CheckGroup::new(
            Some(NodeProcess::Kubelet),
            Subject::Tree {
                root: paths.kubelet_service_dir.clone(),
                scope: TreeScope::FilesOnly,
            },
        )
        .item(CheckItem::scored(
            [2, 2, 3],
            "Ensure that the kubelet service file permissions are set to 644 or more restrictive",
            perms(),
        ))
        .item(CheckItem::scored(
            [2, 2, 4],
            "Ensure that the kubelet service file ownership is set to root:root",
            root_owned(),
        )),
        // kube-proxy resolves a relative --kubeconfig against where we run,
        // not against its own working directory.
        CheckGroup::new(
            Some(NodeProcess::KubeProxy),
            Subject::FlagPath(FlagQuery::new("kubeconfig").base(BaseDir::CurrentDir)),
        )
        .item(CheckItem::scored(
            [2, 2, 5],
            "Ensure that the proxy kubeconfig file permissions are set to 644 or more restrictive",
            perms(),
        ))
        .item(CheckItem::scored(
            [2, 2, 6],
            "Ensure that the proxy kubeconfig file ownership is set to root:root",
            root_owned(),
        )),
        CheckGroup::new(
            Some(NodeProcess::Kubelet),
            Subject::FlagPath(FlagQuery::new("client-ca-file")),
        )
        .item(CheckItem::scored(
            [2, 2, 7],
            "Ensure that the certificate authorities file permissions are set to 644 or more restrictive",
            perms(),
        ))
        .item(CheckItem::scored(
            [2, 2, 8],
            "Ensure that the client certificate authorities file ownership is set to root:root",
            root_owned(),
        )),
        CheckGroup::new(
            Some(NodeProcess::Kubelet),
            Subject::FlagPath(FlagQuery::new("config")),
        )
        .item(CheckItem::scored(
            [2, 2, 9],
            "Ensure that the kubelet configuration file ownership is set to root:root",
            root_owned(),
        ))
        .item(CheckItem::scored(
            [2, 2, 10],
            "Ensure that the kubelet configuration file has permissions set to 644 or more restrictive",
            perms(),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_item_is_scored() {
        let groups = groups(&BenchPaths::default());
        assert_eq!(groups.len(), 5);
        assert!(groups.iter().flat_map(|g| &g.items).all(|i| i.scored));
    }

    #[test]
    fn test_proxy_kubeconfig_uses_current_dir() {
        let groups = groups(&BenchPaths::default());
        let proxy = groups
            .iter()
            .find(|g| g.process == Some(NodeProcess::KubeProxy))
            .unwrap();
        assert_eq!(
            proxy.subject,
            Subject::FlagPath(FlagQuery::new("kubeconfig").base(BaseDir::CurrentDir))
        );
    }

    #[test]
    fn test_service_dir_follows_paths() {
        let paths = BenchPaths {
            kubelet_service_dir: "/opt/units/kubelet.service.d".into(),
        };
        let groups = groups(&paths);
        match &groups[1].subject {
            Subject::Tree { root, scope } => {
                assert_eq!(root.to_str(), Some("/opt/units/kubelet.service.d"));
                assert_eq!(*scope, TreeScope::FilesOnly);
            }
            other => panic!("unexpected subject {:?}", other),
        }
        assert_eq!(groups[1].process, Some(NodeProcess::Kubelet));
    }
}
