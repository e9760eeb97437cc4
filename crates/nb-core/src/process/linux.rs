//! `/proc` process locator.
//!
//! Walks numeric entries of a procfs root in ascending pid order, so the
//! lowest matching pid wins. Processes that exit between the directory
//! listing and the read are ignored.

use super::{matches_name, LocateError, ProcessHandle, ProcessLocator};
use crate::bounded::{BoundedIoError, IoBounds};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Locates processes by reading a procfs tree.
#[derive(Debug, Clone)]
pub struct ProcLocator {
    root: PathBuf,
    bounds: IoBounds,
}

impl ProcLocator {
    /// Locator over `root` (normally `/proc`).
    pub fn new(root: impl Into<PathBuf>, bounds: IoBounds) -> Self {
        Self {
            root: root.into(),
            bounds,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn list_pids(&self) -> Result<Vec<u32>, LocateError> {
        let entries = self
            .bounds
            .read_dir_sorted(&self.root)
            .map_err(|source| LocateError::Enumerate {
                path: self.root.clone(),
                source,
            })?;

        let mut pids: Vec<u32> = entries
            .iter()
            .filter_map(|p| p.file_name()?.to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn read_cmdline(&self, pid: u32) -> Result<Vec<String>, BoundedIoError> {
        let raw = self.bounds.read(&self.root.join(pid.to_string()).join("cmdline"))?;
        Ok(split_cmdline(&raw))
    }

    fn read_comm(&self, pid: u32) -> Option<String> {
        let raw = self
            .bounds
            .read(&self.root.join(pid.to_string()).join("comm"))
            .ok()?;
        Some(String::from_utf8_lossy(&raw).trim_end_matches('\n').to_string())
    }

    fn read_cwd(&self, pid: u32) -> Option<PathBuf> {
        self.bounds
            .read_link(&self.root.join(pid.to_string()).join("cwd"))
            .ok()
    }
}

impl ProcessLocator for ProcLocator {
    fn locate(&self, name: &str) -> Result<Option<ProcessHandle>, LocateError> {
        let pids = self.list_pids()?;
        let mut denied: Option<PathBuf> = None;

        for pid in pids {
            let args = match self.read_cmdline(pid) {
                Ok(args) => args,
                Err(e) if e.is_not_found() => {
                    trace!(pid, "process exited during scan");
                    continue;
                }
                Err(e) if e.is_permission_denied() => {
                    denied.get_or_insert_with(|| self.root.join(pid.to_string()));
                    continue;
                }
                Err(BoundedIoError::TimedOut { timeout, .. }) => {
                    return Err(LocateError::Timeout(timeout));
                }
                Err(e) => {
                    trace!(pid, error = %e, "skipping unreadable process entry");
                    continue;
                }
            };

            // Kernel threads have an empty command line.
            let Some(argv0) = args.first() else {
                continue;
            };

            let matched = matches_name(name, argv0, None)
                || matches_name(name, argv0, self.read_comm(pid).as_deref());
            if !matched {
                continue;
            }

            let mut handle = ProcessHandle::new(name, pid, args);
            if let Some(cwd) = self.read_cwd(pid) {
                handle = handle.with_cwd(cwd);
            }
            debug!(process = name, pid, "process located via procfs");
            return Ok(Some(handle));
        }

        match denied {
            Some(path) => Err(LocateError::PermissionDenied(path)),
            None => Ok(None),
        }
    }
}

/// Split a NUL-separated `cmdline` into arguments.
///
/// Some processes rewrite their argument area into a single space-separated
/// string; that form is split on whitespace instead.
pub fn split_cmdline(raw: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim_end_matches('\0');
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.contains('\0') {
        trimmed.split('\0').map(str::to_string).collect()
    } else {
        trimmed.split_whitespace().map(str::to_string).collect()
    }
}
