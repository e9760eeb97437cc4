//! Bounded execution of blocking process-table and filesystem calls.
//!
//! A single `stat` on a hung network mount can block forever. Every call the
//! audit makes against the host goes through [`IoBounds`], which runs it on a
//! short-lived worker thread and stops waiting after the configured timeout.
//! A timed-out worker is detached; it finishes (or not) on its own.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default timeout per host call in milliseconds.
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 5000;

/// Errors from a bounded host call.
#[derive(Debug, Error)]
pub enum BoundedIoError {
    #[error("{operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("{operation} timed out after {timeout:?}")]
    TimedOut { operation: String, timeout: Duration },

    #[error("{operation}: worker thread exited without a result")]
    WorkerLost { operation: String },
}

impl BoundedIoError {
    /// The underlying I/O error kind, if this is an I/O error.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            BoundedIoError::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// True if the call failed because the entry does not exist.
    pub fn is_not_found(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::NotFound)
    }

    /// True if the call failed on a permission check.
    pub fn is_permission_denied(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::PermissionDenied)
    }
}

impl BoundedIoError {
    /// Convert into the shared error type, attributing it to `path`.
    pub fn into_error(self, path: &Path) -> nb_common::Error {
        match self {
            BoundedIoError::Io { source, .. }
                if source.kind() == io::ErrorKind::PermissionDenied =>
            {
                nb_common::Error::PermissionDenied {
                    path: path.to_path_buf(),
                }
            }
            BoundedIoError::Io { source, .. } => nb_common::Error::Metadata {
                path: path.to_path_buf(),
                message: source.to_string(),
            },
            BoundedIoError::TimedOut { operation, timeout } => nb_common::Error::Timeout {
                operation,
                millis: timeout.as_millis() as u64,
            },
            BoundedIoError::WorkerLost { operation } => nb_common::Error::Metadata {
                path: path.to_path_buf(),
                message: format!("{} did not complete", operation),
            },
        }
    }
}

/// Timeout policy for host calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoBounds {
    timeout: Duration,
}

impl Default for IoBounds {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_IO_TIMEOUT_MS))
    }
}

impl IoBounds {
    /// Create bounds with the given per-call timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `f` on a worker thread, waiting at most the configured timeout.
    pub fn call<T, F>(&self, operation: impl Into<String>, f: F) -> Result<T, BoundedIoError>
    where
        T: Send + 'static,
        F: FnOnce() -> io::Result<T> + Send + 'static,
    {
        let operation = operation.into();
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("nb-bounded-io".to_string())
            .spawn(move || {
                // The receiver may be gone after a timeout.
                let _ = tx.send(f());
            });
        if let Err(source) = spawned {
            return Err(BoundedIoError::Io { operation, source });
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(BoundedIoError::Io { operation, source }),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    operation = %operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "host call timed out; detaching worker"
                );
                Err(BoundedIoError::TimedOut {
                    operation,
                    timeout: self.timeout,
                })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(BoundedIoError::WorkerLost { operation })
            }
        }
    }

    /// `stat` following symlinks.
    pub fn metadata(&self, path: &Path) -> Result<Metadata, BoundedIoError> {
        let owned = path.to_path_buf();
        self.call(format!("stat {}", path.display()), move || {
            fs::metadata(owned)
        })
    }

    /// `lstat`, not following symlinks.
    pub fn symlink_metadata(&self, path: &Path) -> Result<Metadata, BoundedIoError> {
        let owned = path.to_path_buf();
        self.call(format!("lstat {}", path.display()), move || {
            fs::symlink_metadata(owned)
        })
    }

    /// Read a whole file as bytes.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>, BoundedIoError> {
        let owned = path.to_path_buf();
        self.call(format!("read {}", path.display()), move || fs::read(owned))
    }

    /// Read a symlink target.
    pub fn read_link(&self, path: &Path) -> Result<PathBuf, BoundedIoError> {
        let owned = path.to_path_buf();
        self.call(format!("readlink {}", path.display()), move || {
            fs::read_link(owned)
        })
    }

    /// List a directory, returning entry paths sorted by file name.
    pub fn read_dir_sorted(&self, path: &Path) -> Result<Vec<PathBuf>, BoundedIoError> {
        let owned = path.to_path_buf();
        self.call(format!("readdir {}", path.display()), move || {
            let mut entries = Vec::new();
            for entry in fs::read_dir(owned)? {
                entries.push(entry?.path());
            }
            entries.sort();
            Ok(entries)
        })
    }
}
