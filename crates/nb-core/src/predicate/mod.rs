//! File predicate engine.
//!
//! Declarative checks over filesystem metadata:
//! - [`PermissionPredicate`]: numeric mode comparison against a threshold
//! - [`OwnershipPredicate`]: owning user and group by name
//! - [`tree`]: the same predicates applied to every entry under a directory
//! - [`FlagCheck`]: a running process's effective flag value
//!
//! A predicate evaluates to a [`Verdict`]. Failing to read metadata or the
//! identity databases is a [`PredicateError`], never a failed verdict.

pub mod flag_value;
pub mod ownership;
pub mod permissions;
pub mod principals;
pub mod tree;

pub use flag_value::{FlagCheck, FlagPredicate};
pub use ownership::{check_ownership, OwnershipPredicate, ResolvedOwner};
pub use permissions::{check_permissions, PermissionOp, PermissionPredicate};
pub use principals::{PrincipalKind, Principals};
pub use tree::{check_tree, TreeReport, TreeScope, Violation};

use crate::bounded::BoundedIoError;
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::PathBuf;
use thiserror::Error;

/// Result of evaluating a predicate against one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    /// Observed versus expected, e.g. `0666 > 0644`.
    pub detail: String,
}

impl Verdict {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Errors raised while evaluating a predicate.
#[derive(Debug, Error)]
pub enum PredicateError {
    #[error("cannot read metadata of {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: BoundedIoError,
    },

    #[error("unknown {kind} '{name}'")]
    UnknownPrincipal { kind: PrincipalKind, name: String },

    #[error("cannot read {kind} database {path}: {source}")]
    Database {
        kind: PrincipalKind,
        path: PathBuf,
        #[source]
        source: BoundedIoError,
    },

    #[error("file ownership and mode bits are not available on this platform")]
    Unsupported,
}

impl From<PredicateError> for nb_common::Error {
    fn from(err: PredicateError) -> Self {
        match err {
            PredicateError::Metadata { path, source } => source.into_error(&path),
            PredicateError::UnknownPrincipal { kind, name } => nb_common::Error::UnknownPrincipal {
                kind: kind.to_string(),
                name,
            },
            PredicateError::Database { kind, path, source } => {
                nb_common::Error::PrincipalDatabase {
                    kind: kind.to_string(),
                    path,
                    message: source.to_string(),
                }
            }
            PredicateError::Unsupported => {
                nb_common::Error::UnsupportedPlatform(std::env::consts::OS.to_string())
            }
        }
    }
}

/// Permission bits of an entry.
#[cfg(unix)]
pub fn mode_bits(meta: &Metadata) -> Result<u32, PredicateError> {
    use std::os::unix::fs::MetadataExt;
    Ok(meta.mode())
}

#[cfg(not(unix))]
pub fn mode_bits(_meta: &Metadata) -> Result<u32, PredicateError> {
    Err(PredicateError::Unsupported)
}

/// Numeric owner `(uid, gid)` of an entry.
#[cfg(unix)]
pub fn owner_ids(meta: &Metadata) -> Result<(u32, u32), PredicateError> {
    use std::os::unix::fs::MetadataExt;
    Ok((meta.uid(), meta.gid()))
}

#[cfg(not(unix))]
pub fn owner_ids(_meta: &Metadata) -> Result<(u32, u32), PredicateError> {
    Err(PredicateError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_verdict_constructors() {
        assert!(Verdict::pass("ok").passed);
        assert!(!Verdict::fail("bad").passed);
    }

    #[test]
    fn test_error_codes() {
        let err: nb_common::Error = PredicateError::UnknownPrincipal {
            kind: PrincipalKind::User,
            name: "kube".into(),
        }
        .into();
        assert_eq!(err.code(), 40);
        assert!(err.to_string().contains("user"));

        let err: nb_common::Error = PredicateError::Metadata {
            path: PathBuf::from("/etc/kubernetes/kubelet.conf"),
            source: BoundedIoError::Io {
                operation: "stat".into(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            },
        }
        .into();
        assert_eq!(err.code(), 30);

        let err: nb_common::Error = PredicateError::Database {
            kind: PrincipalKind::Group,
            path: PathBuf::from("/etc/group"),
            source: BoundedIoError::WorkerLost {
                operation: "read".into(),
            },
        }
        .into();
        assert_eq!(err.code(), 41);
    }
}
