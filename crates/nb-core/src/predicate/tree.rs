//! Directory tree evaluation.
//!
//! Applies a predicate to every entry under a root and collects every
//! violation instead of stopping at the first. Entries are visited in name
//! order, each exactly once. Symlinks are evaluated through their target
//! but never descended into.

use super::{PredicateError, Verdict};
use crate::bounded::IoBounds;
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Which entries of a tree are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeScope {
    /// Regular files (and symlinks to them) only.
    #[default]
    FilesOnly,
    /// Directories too, including the root.
    All,
}

/// One entry that failed the predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: PathBuf,
    pub detail: String,
}

/// Aggregated result of a tree check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeReport {
    pub root: PathBuf,
    /// Number of entries the predicate was applied to.
    pub checked: usize,
    pub violations: Vec<Violation>,
}

impl TreeReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Collapse into a single verdict naming every violating entry.
    pub fn into_verdict(self) -> Verdict {
        if self.violations.is_empty() {
            return Verdict::pass(format!(
                "{} entries under {} checked",
                self.checked,
                self.root.display()
            ));
        }
        let listed: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.path.display(), v.detail))
            .collect();
        Verdict::fail(format!(
            "{} of {} entries under {} violate: {}",
            self.violations.len(),
            self.checked,
            self.root.display(),
            listed.join("; ")
        ))
    }
}

/// Walk `root` and apply `eval` to each in-scope entry.
///
/// `eval` receives the entry path and its metadata with symlinks followed.
/// Entries that vanish during the walk and dangling symlinks are ignored.
/// Any other I/O error or evaluation error aborts the walk.
pub fn check_tree<F>(
    root: &Path,
    scope: TreeScope,
    bounds: &IoBounds,
    mut eval: F,
) -> Result<TreeReport, PredicateError>
where
    F: FnMut(&Path, &Metadata) -> Result<Verdict, PredicateError>,
{
    let mut report = TreeReport {
        root: root.to_path_buf(),
        checked: 0,
        violations: Vec::new(),
    };
    let mut pending = vec![root.to_path_buf()];

    while let Some(path) = pending.pop() {
        let lmeta = match bounds.symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) if e.is_not_found() && path != root => continue,
            Err(source) => return Err(PredicateError::Metadata { path, source }),
        };

        if lmeta.is_dir() {
            let children = bounds
                .read_dir_sorted(&path)
                .map_err(|source| PredicateError::Metadata {
                    path: path.clone(),
                    source,
                })?;
            // Reverse so the stack pops in name order.
            pending.extend(children.into_iter().rev());

            if scope == TreeScope::All {
                visit(&path, &lmeta, &mut report, &mut eval)?;
            }
            continue;
        }

        let meta = if lmeta.file_type().is_symlink() {
            match bounds.metadata(&path) {
                Ok(m) => m,
                Err(e) if e.is_not_found() => {
                    trace!(path = %path.display(), "dangling symlink ignored");
                    continue;
                }
                Err(source) => return Err(PredicateError::Metadata { path, source }),
            }
        } else {
            lmeta
        };

        if meta.is_dir() && scope == TreeScope::FilesOnly {
            continue;
        }
        visit(&path, &meta, &mut report, &mut eval)?;
    }

    Ok(report)
}

fn visit<F>(
    path: &Path,
    meta: &Metadata,
    report: &mut TreeReport,
    eval: &mut F,
) -> Result<(), PredicateError>
where
    F: FnMut(&Path, &Metadata) -> Result<Verdict, PredicateError>,
{
    let verdict = eval(path, meta)?;
    report.checked += 1;
    if !verdict.passed {
        report.violations.push(Violation {
            path: path.to_path_buf(),
            detail: verdict.detail,
        });
    }
    Ok(())
}
