//! Shared fixtures for integration tests: a fake node rooted in a temp dir.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub fn current_ids() -> (u32, u32) {
    // SAFETY: geteuid/getegid cannot fail.
    unsafe { (libc::geteuid(), libc::getegid()) }
}

/// Identity databases a [`FakeNode`] starts with.
pub enum Identities {
    /// `root` is the test user.
    RootIsMe,
    /// `root` is someone else; the test user is `kube`.
    RootIsOther,
    /// `root` is someone else; the test user has no entry at all.
    Orphaned,
}

pub struct FakeNode {
    dir: tempfile::TempDir,
}

impl FakeNode {
    pub fn new(identities: Identities) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let node = Self { dir };
        let (uid, gid) = current_ids();
        let (other_uid, other_gid) = (uid.wrapping_add(7), gid.wrapping_add(7));
        let (passwd, group) = match identities {
            Identities::RootIsMe => (
                format!("root:x:{uid}:{gid}:root:/root:/bin/sh\n"),
                format!("root:x:{gid}:\n"),
            ),
            Identities::RootIsOther => (
                format!("root:x:{other_uid}:{other_gid}::/root:/bin/sh\nkube:x:{uid}:{gid}::/:/bin/false\n"),
                format!("root:x:{other_gid}:\nkube:x:{gid}:\n"),
            ),
            Identities::Orphaned => (
                format!("root:x:{other_uid}:{other_gid}::/root:/bin/sh\n"),
                format!("root:x:{other_gid}:\n"),
            ),
        };
        node.write("etc/passwd", &passwd, 0o644);
        node.write("etc/group", &group, 0o644);
        fs::create_dir_all(node.path("proc")).expect("proc");
        node
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

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

    pub fn service_dir(&self) -> PathBuf {
        self.path("etc/systemd/system/kubelet.service.d")
    }

    pub fn write(&self, rel: &str, contents: &str, mode: u32) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, contents).expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("chmod");
        path
    }

    /// Add `/proc/<pid>` with the given argument vector.
    pub fn spawn(&self, pid: u32, args: &[&str]) {
        let dir = self.proc_root().join(pid.to_string());
        fs::create_dir_all(&dir).expect("pid dir");
        let mut cmdline = args.join("\0").into_bytes();
        cmdline.push(0);
        fs::write(dir.join("cmdline"), cmdline).expect("cmdline");
        let comm = Path::new(args[0])
            .file_name()
            .map(|n| n.to_string_lossy().chars().take(15).collect::<String>())
            .unwrap_or_default();
        fs::write(dir.join("comm"), format!("{}\n", comm)).expect("comm");
    }

    /// A config file pointing every host path into this node.
    pub fn config_file(&self, extra: &str) -> PathBuf {
        let text = format!(
            "{extra}\n[host]\nproc_root = {proc:?}\npasswd = {passwd:?}\ngroup = {group:?}\n\n[paths]\nkubelet_service_dir = {svc:?}\n",
            extra = extra,
            proc = self.proc_root().to_string_lossy(),
            passwd = self.passwd().to_string_lossy(),
            group = self.group().to_string_lossy(),
            svc = self.service_dir().to_string_lossy(),
        );
        self.write("node-bench.toml", &text, 0o644)
    }
}
