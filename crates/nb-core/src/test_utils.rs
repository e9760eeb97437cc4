//! Test utilities for nb-core.
//!
//! This module provides test infrastructure including:
//! - Result assertions
//! - A throwaway host layout (`/etc/passwd`, `/etc/group`, a fake `/proc`)
//!   rooted in a temp directory
//! - Test timing

use crate::bounded::IoBounds;
use crate::predicate::Principals;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

// ============================================================================
// Macros (must be defined first for use in this module)
// ============================================================================

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Assert that a Result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(val) => panic!("Expected Err, got Ok: {:?}", val),
            Err(_) => {}
        }
    };
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(val) => panic!("{}: got Ok({:?})", $msg, val),
            Err(_) => {}
        }
    };
}

// ============================================================================
// Identity
// ============================================================================

/// Effective uid and gid of the test process. Files the test creates are
/// owned by these.
#[cfg(unix)]
pub fn current_ids() -> (u32, u32) {
    // SAFETY: geteuid/getegid have no preconditions and cannot fail.
    unsafe { (libc::geteuid(), libc::getegid()) }
}

#[cfg(not(unix))]
pub fn current_ids() -> (u32, u32) {
    (0, 0)
}

// ============================================================================
// Test host
// ============================================================================

/// A fake host rooted in a temp directory.
///
/// By default `root` in the fake identity databases maps to the test
/// process's own uid and gid, so files the test creates count as
/// `root:root`. [`TestHost::with_foreign_root`] flips that so they don't.
pub struct TestHost {
    dir: tempfile::TempDir,
}

impl TestHost {
    pub fn new() -> Self {
        let (uid, gid) = current_ids();
        Self::with_databases(
            &format!(
                "root:x:{uid}:{gid}:root:/root:/bin/sh\nkube:x:{}:{}::/home/kube:/bin/sh\n",
                uid.wrapping_add(1),
                gid.wrapping_add(1)
            ),
            &format!("root:x:{gid}:\nkube:x:{}:\n", gid.wrapping_add(1)),
        )
    }

    /// `root` maps to ids other than the test process's; the process's own
    /// ids map to `kube`.
    pub fn with_foreign_root() -> Self {
        let (uid, gid) = current_ids();
        Self::with_databases(
            &format!(
                "root:x:{}:{}:root:/root:/bin/sh\nkube:x:{uid}:{gid}::/home/kube:/bin/sh\n",
                uid.wrapping_add(1),
                gid.wrapping_add(1)
            ),
            &format!("root:x:{}:\nkube:x:{gid}:\n", gid.wrapping_add(1)),
        )
    }

    /// Identity databases with exactly the given contents.
    pub fn with_databases(passwd: &str, group: &str) -> Self {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => panic!("failed to create temp dir: {}", e),
        };
        let host = Self { dir };
        host.write("etc/passwd", passwd);
        host.write("etc/group", group);
        host.mkdir("proc");
        host
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `rel` inside the host.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn proc_root(&self) -> PathBuf {
        self.path("proc")
    }

    pub fn passwd(&self) -> PathBuf {
        self.path("etc/passwd")
    }

    pub fn group(&self) -> PathBuf {
        self.path("etc/group")
    }

    pub fn principals(&self) -> Principals {
        Principals::new(self.passwd(), self.group(), IoBounds::default())
    }

    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        if let Err(e) = fs::create_dir_all(&path) {
            panic!("failed to create {}: {}", path.display(), e);
        }
        path
    }

    /// Write a file, creating parents.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                panic!("failed to create {}: {}", parent.display(), e);
            }
        }
        if let Err(e) = fs::write(&path, contents) {
            panic!("failed to write {}: {}", path.display(), e);
        }
        path
    }

    /// Write a file and set its mode.
    #[cfg(unix)]
    pub fn write_mode(&self, rel: &str, contents: &str, mode: u32) -> PathBuf {
        let path = self.write(rel, contents);
        set_mode(&path, mode);
        path
    }

    /// Add a process to the fake `/proc`.
    ///
    /// `args` is the full argument vector; `comm` is derived from `args[0]`
    /// the way the kernel does it.
    pub fn add_process(&self, pid: u32, args: &[&str], cwd: Option<&Path>) -> PathBuf {
        let dir = self.mkdir(&format!("proc/{}", pid));
        let mut cmdline = Vec::new();
        for arg in args {
            cmdline.extend_from_slice(arg.as_bytes());
            cmdline.push(0);
        }
        if let Err(e) = fs::write(dir.join("cmdline"), cmdline) {
            panic!("failed to write cmdline: {}", e);
        }
        let comm: String = args
            .first()
            .and_then(|a| Path::new(a).file_name())
            .map(|n| n.to_string_lossy().chars().take(crate::process::COMM_LEN).collect())
            .unwrap_or_default();
        if let Err(e) = fs::write(dir.join("comm"), format!("{}\n", comm)) {
            panic!("failed to write comm: {}", e);
        }
        #[cfg(unix)]
        if let Some(cwd) = cwd {
            if let Err(e) = std::os::unix::fs::symlink(cwd, dir.join("cwd")) {
                panic!("failed to link cwd: {}", e);
            }
        }
        #[cfg(not(unix))]
        let _ = cwd;
        dir
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Set permission bits on `path`.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        panic!("failed to chmod {}: {}", path.display(), e);
    }
}

// ============================================================================
// Test Timer
// ============================================================================

/// Test timer for measuring duration of operations.
pub struct TestTimer {
    name: String,
    start: Instant,
}

impl TestTimer {
    /// Start a new timer with the given name.
    pub fn new(name: &str) -> Self {
        let timer = Self {
            name: name.to_string(),
            start: Instant::now(),
        };
        eprintln!("[TIMER] {} started", name);
        timer
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Drop for TestTimer {
    fn drop(&mut self) {
        eprintln!("[TIMER] {} completed in {}ms", self.name, self.elapsed_ms());
    }
}
