//! User and group name lookup from passwd/group style databases.
//!
//! Both files use colon-separated records with the name in the first field
//! and the numeric id in the third. Databases are re-read on every lookup.

use super::PredicateError;
use crate::bounded::IoBounds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_PASSWD: &str = "/etc/passwd";
pub const DEFAULT_GROUP: &str = "/etc/group";

/// Which identity database a name or id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Group,
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalKind::User => write!(f, "user"),
            PrincipalKind::Group => write!(f, "group"),
        }
    }
}

/// A `name:...:id:...` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalEntry {
    pub name: String,
    pub id: u32,
}

/// Parse passwd/group text. Comments, blank and malformed lines are skipped.
pub fn parse_database(text: &str) -> Vec<PrincipalEntry> {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 3 || fields[0].is_empty() {
                return None;
            }
            let id = fields[2].trim().parse().ok()?;
            Some(PrincipalEntry {
                name: fields[0].to_string(),
                id,
            })
        })
        .collect()
}

/// Name/id resolver over a passwd and a group file.
#[derive(Debug, Clone)]
pub struct Principals {
    passwd: PathBuf,
    group: PathBuf,
    bounds: IoBounds,
}

impl Default for Principals {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWD, DEFAULT_GROUP, IoBounds::default())
    }
}

impl Principals {
    pub fn new(passwd: impl Into<PathBuf>, group: impl Into<PathBuf>, bounds: IoBounds) -> Self {
        Self {
            passwd: passwd.into(),
            group: group.into(),
            bounds,
        }
    }

    /// Path of the database for `kind`.
    pub fn database(&self, kind: PrincipalKind) -> &Path {
        match kind {
            PrincipalKind::User => &self.passwd,
            PrincipalKind::Group => &self.group,
        }
    }

    fn load(&self, kind: PrincipalKind) -> Result<Vec<PrincipalEntry>, PredicateError> {
        let path = self.database(kind);
        let raw = self
            .bounds
            .read(path)
            .map_err(|source| PredicateError::Database {
                kind,
                path: path.to_path_buf(),
                source,
            })?;
        Ok(parse_database(&String::from_utf8_lossy(&raw)))
    }

    /// Numeric id of `name`, or `UnknownPrincipal` when absent.
    pub fn id_of(&self, kind: PrincipalKind, name: &str) -> Result<u32, PredicateError> {
        self.load(kind)?
            .into_iter()
            .find(|e| e.name == name)
            .map(|e| e.id)
            .ok_or_else(|| PredicateError::UnknownPrincipal {
                kind,
                name: name.to_string(),
            })
    }

    /// First name mapped to `id`, if any.
    pub fn name_of(&self, kind: PrincipalKind, id: u32) -> Result<Option<String>, PredicateError> {
        Ok(self
            .load(kind)?
            .into_iter()
            .find(|e| e.id == id)
            .map(|e| e.name))
    }

    pub fn uid_of(&self, user: &str) -> Result<u32, PredicateError> {
        self.id_of(PrincipalKind::User, user)
    }

    pub fn gid_of(&self, group: &str) -> Result<u32, PredicateError> {
        self.id_of(PrincipalKind::Group, group)
    }
}
