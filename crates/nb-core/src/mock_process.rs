//! Mock process locator for testing.
//!
//! [`MockLocator`] answers lookups from a fixed list of handles and can be
//! told to fail the way a real process table fails. [`MockHandleBuilder`]
//! builds handles from an argument vector.
//!
//! # Example
//!
//! ```ignore
//! use nb_core::mock_process::{MockHandleBuilder, MockLocator};
//!
//! let kubelet = MockHandleBuilder::new("kubelet")
//!     .pid(812)
//!     .flag("kubeconfig", "/etc/kubernetes/kubelet.conf")
//!     .flag("anonymous-auth", "false")
//!     .build();
//!
//! let locator = MockLocator::new().with_process(kubelet);
//! ```

use crate::process::{LocateError, ProcessHandle, ProcessLocator};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Default pid handed out by [`MockHandleBuilder`].
pub const MOCK_PID: u32 = 4242;

/// How a [`MockLocator`] fails every lookup.
#[derive(Debug, Clone)]
enum Failure {
    Denied(PathBuf),
    Timeout(Duration),
    Command(String),
}

/// Locator over a fixed set of handles.
#[derive(Debug, Default)]
pub struct MockLocator {
    processes: Vec<ProcessHandle>,
    failure: Option<Failure>,
    lookups: AtomicUsize,
}

impl MockLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a process that lookups by its name will find.
    pub fn with_process(mut self, handle: ProcessHandle) -> Self {
        self.processes.push(handle);
        self
    }

    /// Fail every lookup with a permission error on `path`.
    pub fn denied(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure = Some(Failure::Denied(path.into()));
        self
    }

    /// Fail every lookup with a timeout.
    pub fn timing_out(mut self, timeout: Duration) -> Self {
        self.failure = Some(Failure::Timeout(timeout));
        self
    }

    /// Fail every lookup with a command error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(Failure::Command(message.into()));
        self
    }

    /// Number of lookups served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl ProcessLocator for MockLocator {
    fn locate(&self, name: &str) -> Result<Option<ProcessHandle>, LocateError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(Failure::Denied(path)) => return Err(LocateError::PermissionDenied(path.clone())),
            Some(Failure::Timeout(timeout)) => return Err(LocateError::Timeout(*timeout)),
            Some(Failure::Command(message)) => return Err(LocateError::Command(message.clone())),
            None => {}
        }
        Ok(self
            .processes
            .iter()
            .filter(|p| p.name() == name)
            .min_by_key(|p| p.pid())
            .cloned())
    }
}

/// Builder for [`ProcessHandle`] test values.
#[derive(Debug, Clone)]
pub struct MockHandleBuilder {
    name: String,
    pid: u32,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl MockHandleBuilder {
    /// Start a handle whose `argv[0]` is `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pid: MOCK_PID,
            args: vec![format!("/usr/bin/{}", name)],
            cwd: None,
        }
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// Append `--name=value`.
    pub fn flag(mut self, name: &str, value: &str) -> Self {
        self.args.push(format!("--{}={}", name, value));
        self
    }

    /// Append a bare `--name`.
    pub fn switch(mut self, name: &str) -> Self {
        self.args.push(format!("--{}", name));
        self
    }

    /// Append raw tokens.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn build(self) -> ProcessHandle {
        let handle = ProcessHandle::new(self.name, self.pid, self.args);
        match self.cwd {
            Some(cwd) => handle.with_cwd(cwd),
            None => handle,
        }
    }
}

/// A kubelet handle with the usual kubeadm flags.
pub fn kubeadm_kubelet(config_dir: &str) -> ProcessHandle {
    MockHandleBuilder::new("kubelet")
        .pid(812)
        .flag("kubeconfig", &format!("{}/kubelet.conf", config_dir))
        .flag("config", &format!("{}/config.yaml", config_dir))
        .flag("client-ca-file", &format!("{}/pki/ca.crt", config_dir))
        .build()
}
