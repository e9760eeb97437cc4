//! Process location.
//!
//! A [`ProcessLocator`] finds a running node process by name and returns a
//! read-only [`ProcessHandle`] carrying its argument vector, pid and working
//! directory. "Not running" is `Ok(None)`, never an error; what to do about
//! it is the caller's policy.
//!
//! Implementations:
//! - [`ProcLocator`]: reads a `/proc`-style tree (Linux)
//! - [`PsLocator`]: parses `ps` output (macOS and other Unix systems)

pub mod linux;
pub mod ps;

pub use linux::ProcLocator;
pub use ps::PsLocator;

use crate::bounded::{BoundedIoError, IoBounds};
use crate::flags::FlagSet;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Kernel command names are truncated to this many bytes.
pub const COMM_LEN: usize = 15;

/// Errors from a process table lookup.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("permission denied reading process entries under {0}")]
    PermissionDenied(PathBuf),

    #[error("cannot enumerate processes under {path}: {source}")]
    Enumerate {
        path: PathBuf,
        #[source]
        source: BoundedIoError,
    },

    #[error("process lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("ps failed: {0}")]
    Command(String),
}

impl From<LocateError> for nb_common::Error {
    fn from(err: LocateError) -> Self {
        match err {
            LocateError::PermissionDenied(path) => nb_common::Error::ProcessTableDenied { path },
            LocateError::Enumerate { path, source } if source.is_permission_denied() => {
                nb_common::Error::ProcessTableDenied { path }
            }
            LocateError::Enumerate {
                source: BoundedIoError::TimedOut { operation, timeout },
                ..
            } => nb_common::Error::Timeout {
                operation,
                millis: timeout.as_millis() as u64,
            },
            LocateError::Timeout(timeout) => nb_common::Error::Timeout {
                operation: "process table lookup".to_string(),
                millis: timeout.as_millis() as u64,
            },
            other => nb_common::Error::ProcessTable(other.to_string()),
        }
    }
}

/// A located process. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessHandle {
    name: String,
    pid: u32,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    #[serde(skip)]
    flags: FlagSet,
}

impl ProcessHandle {
    /// Build a handle; the argument vector is tokenized here, once.
    pub fn new(name: impl Into<String>, pid: u32, args: Vec<String>) -> Self {
        let flags = FlagSet::parse(&args);
        Self {
            name: name.into(),
            pid,
            args,
            cwd: None,
            flags,
        }
    }

    /// Attach the process working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The name the process was located by.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Full argument vector, `args[0]` included.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Working directory, when it was readable.
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    /// Effective raw value of a flag.
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        self.flags.get(name)
    }
}

/// Finds a running process by name.
pub trait ProcessLocator: Send + Sync {
    /// `Ok(Some)` when found, `Ok(None)` when not running, `Err` when the
    /// process table could not be read.
    fn locate(&self, name: &str) -> Result<Option<ProcessHandle>, LocateError>;
}

/// Locator for the host platform.
#[cfg(target_os = "linux")]
pub fn default_locator(proc_root: &Path, bounds: IoBounds) -> Box<dyn ProcessLocator> {
    Box::new(ProcLocator::new(proc_root, bounds))
}

/// Locator for the host platform.
#[cfg(not(target_os = "linux"))]
pub fn default_locator(_proc_root: &Path, bounds: IoBounds) -> Box<dyn ProcessLocator> {
    Box::new(PsLocator::new(bounds))
}

/// True if `argv0` or `comm` identifies a process called `name`.
///
/// `argv0` is compared by basename. `comm` may be the kernel's truncated
/// command name, so a long `name` also matches its first [`COMM_LEN`] bytes.
pub fn matches_name(name: &str, argv0: &str, comm: Option<&str>) -> bool {
    if name.is_empty() {
        return false;
    }
    let base = argv0.rsplit('/').next().unwrap_or(argv0);
    if base == name {
        return true;
    }
    let Some(comm) = comm else {
        return false;
    };
    if comm == name {
        return true;
    }
    name.len() > COMM_LEN && name.get(..COMM_LEN) == Some(comm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_parses_flags_once() {
        let h = ProcessHandle::new(
            "kubelet",
            100,
            vec!["/usr/bin/kubelet".into(), "--config=/var/lib/kubelet/config.yaml".into()],
        );
        assert_eq!(h.name(), "kubelet");
        assert_eq!(h.pid(), 100);
        assert_eq!(h.flag_value("config"), Some("/var/lib/kubelet/config.yaml"));
        assert!(h.cwd().is_none());
        assert_eq!(h.args().len(), 2);
    }

    #[test]
    fn test_matches_name_by_argv0_basename() {
        assert!(matches_name("kubelet", "/usr/local/bin/kubelet", None));
        assert!(matches_name("kubelet", "kubelet", None));
        assert!(!matches_name("kubelet", "/usr/bin/kubelet-wrapper", None));
        assert!(!matches_name("kube", "/usr/bin/kubelet", None));
    }

    #[test]
    fn test_matches_name_by_comm() {
        assert!(matches_name("kube-proxy", "/bin/sh", Some("kube-proxy")));
        assert!(!matches_name("kube-proxy", "/bin/sh", Some("sh")));
    }

    #[test]
    fn test_matches_truncated_comm() {
        let long = "cloud-controller-manager";
        assert!(matches_name(long, "/bin/exe", Some("cloud-controlle")));
        assert!(!matches_name("short", "/bin/exe", Some("shor")));
    }

    #[test]
    fn test_empty_name_never_matches() {
        assert!(!matches_name("", "", Some("")));
    }

    #[test]
    fn test_locate_error_conversion() {
        let err: nb_common::Error = LocateError::PermissionDenied(PathBuf::from("/proc/1")).into();
        assert_eq!(err.code(), 21);

        let err: nb_common::Error = LocateError::Timeout(Duration::from_millis(10)).into();
        assert_eq!(err.code(), 32);

        let err: nb_common::Error = LocateError::Command("exit 1".into()).into();
        assert_eq!(err.code(), 20);
    }
}
