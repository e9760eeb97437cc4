//! Ownership comparison.
//!
//! Expected owners are given by name and resolved to ids before any file
//! is looked at. Actual owners are compared by id, so a file owned by an id
//! with no name on the host is still reported, as the bare number.

use super::principals::{PrincipalKind, Principals};
use super::{owner_ids, PredicateError, Verdict};
use crate::bounded::IoBounds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::Metadata;
use std::path::Path;

/// Expected owning user and group, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipPredicate {
    pub user: String,
    pub group: String,
}

impl OwnershipPredicate {
    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            group: group.into(),
        }
    }

    /// `root:root`.
    pub fn root() -> Self {
        Self::new("root", "root")
    }

    /// Resolve the expected names to ids.
    pub fn resolve(&self, principals: &Principals) -> Result<ResolvedOwner, PredicateError> {
        Ok(ResolvedOwner {
            user: self.user.clone(),
            uid: principals.uid_of(&self.user)?,
            group: self.group.clone(),
            gid: principals.gid_of(&self.group)?,
        })
    }

    /// Stat `path` (following symlinks) and compare its owner.
    pub fn evaluate(
        &self,
        path: &Path,
        principals: &Principals,
        bounds: &IoBounds,
    ) -> Result<Verdict, PredicateError> {
        let expected = self.resolve(principals)?;
        let meta = bounds
            .metadata(path)
            .map_err(|source| PredicateError::Metadata {
                path: path.to_path_buf(),
                source,
            })?;
        expected.evaluate_metadata(&meta, principals)
    }
}

impl fmt::Display for OwnershipPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owned by {}:{}", self.user, self.group)
    }
}

/// Expected owner with names resolved to ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOwner {
    pub user: String,
    pub uid: u32,
    pub group: String,
    pub gid: u32,
}

impl ResolvedOwner {
    pub fn evaluate_metadata(
        &self,
        meta: &Metadata,
        principals: &Principals,
    ) -> Result<Verdict, PredicateError> {
        let (uid, gid) = owner_ids(meta)?;
        self.evaluate_ids(uid, gid, principals)
    }

    /// Compare actual ids. Names for the detail are looked up best-effort.
    pub fn evaluate_ids(
        &self,
        uid: u32,
        gid: u32,
        principals: &Principals,
    ) -> Result<Verdict, PredicateError> {
        let expected = format!(
            "{}:{}",
            label(Some(&self.user), self.uid),
            label(Some(&self.group), self.gid)
        );

        if uid == self.uid && gid == self.gid {
            return Ok(Verdict::pass(format!("owner {}", expected)));
        }

        // A failed database read still leaves a mismatch; show the raw ids.
        let user = principals.name_of(PrincipalKind::User, uid).unwrap_or(None);
        let group = principals.name_of(PrincipalKind::Group, gid).unwrap_or(None);
        Ok(Verdict::fail(format!(
            "owner {}:{}, expected {}",
            label(user.as_deref(), uid),
            label(group.as_deref(), gid),
            expected
        )))
    }
}

/// `name(id)`, or the bare id when the name is unknown.
fn label(name: Option<&str>, id: u32) -> String {
    match name {
        Some(name) => format!("{}({})", name, id),
        None => id.to_string(),
    }
}

/// Check that `path` is owned by `user:group`.
pub fn check_ownership(
    path: &Path,
    user: &str,
    group: &str,
    principals: &Principals,
    bounds: &IoBounds,
) -> Result<Verdict, PredicateError> {
    OwnershipPredicate::new(user, group).evaluate(path, principals, bounds)
}
