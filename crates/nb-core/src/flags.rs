//! Flag resolution from a running process's argument vector.
//!
//! The effective configuration of a node process is whatever it was started
//! with, so file checks start from the live argument vector:
//!
//! 1. [`FlagSet::parse`] tokenizes the argument vector once per process
//!    handle into a name → value map.
//! 2. [`resolve_flag`] turns a [`FlagQuery`] into a [`ResolvedPath`] with
//!    three-way presence: flag not set, set but the file is missing, or set
//!    and present.
//!
//! Absence is never an error. Only unexpected I/O (permission denied,
//! timeouts) is reported as [`FlagError`].

use crate::bounded::{BoundedIoError, IoBounds};
use crate::process::ProcessHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Value recorded for a flag given without a value (`--verbose`).
pub const IMPLICIT_TRUE: &str = "true";

/// Errors that can occur while resolving a flag-derived path.
#[derive(Debug, Error)]
pub enum FlagError {
    #[error("cannot determine current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("--{flag} is relative but the working directory of pid {pid} is unknown")]
    ProcessCwdUnknown { flag: String, pid: u32 },

    #[error("cannot stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: BoundedIoError,
    },
}

impl From<FlagError> for nb_common::Error {
    fn from(err: FlagError) -> Self {
        match err {
            FlagError::CurrentDir(e) => nb_common::Error::Io(e),
            FlagError::ProcessCwdUnknown { pid, .. } => nb_common::Error::PermissionDenied {
                path: PathBuf::from(format!("/proc/{}/cwd", pid)),
            },
            FlagError::Stat { path, source } => source.into_error(&path),
        }
    }
}

/// Parsed long-flag map of a process's argument vector.
///
/// Accepted forms are `--name=value`, `--name value`, `-name=value` and
/// `-name value`. A flag followed by another flag (or by nothing) is a
/// boolean and records [`IMPLICIT_TRUE`]. A following token that starts with
/// `-` is only taken as a value when it is a number (`--oom-score-adj -999`).
/// The last occurrence of a flag wins. Everything after a bare `--` is
/// positional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet {
    values: BTreeMap<String, String>,
}

impl FlagSet {
    /// Tokenize a full argument vector. `args[0]` is the program and is skipped.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Self {
        let mut values = BTreeMap::new();
        let mut i = 1;

        while i < args.len() {
            let token = args[i].as_ref();
            i += 1;

            if token == "--" {
                break;
            }
            let Some(body) = strip_flag_prefix(token) else {
                continue;
            };

            if let Some((name, value)) = body.split_once('=') {
                if !name.is_empty() {
                    values.insert(name.to_string(), value.to_string());
                }
                continue;
            }

            let value = match args.get(i).map(|s| s.as_ref()) {
                Some(next) if takes_as_value(next) => {
                    i += 1;
                    next.to_string()
                }
                _ => IMPLICIT_TRUE.to_string(),
            };
            values.insert(body.to_string(), value);
        }

        FlagSet { values }
    }

    /// Effective value of a flag, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// True if the flag appears in the argument vector.
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of distinct flags.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no flags were parsed.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate flags in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Strip `--` or `-` from a flag token. Returns None for non-flags.
fn strip_flag_prefix(token: &str) -> Option<&str> {
    let body = token
        .strip_prefix("--")
        .or_else(|| token.strip_prefix('-'))?;
    if body.is_empty() || body.starts_with('-') || is_number(token) {
        return None;
    }
    Some(body)
}

fn takes_as_value(next: &str) -> bool {
    next == "-" || !next.starts_with('-') || is_number(next)
}

fn is_number(s: &str) -> bool {
    s.parse::<f64>().is_ok()
}

/// Directory that relative flag values are resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BaseDir {
    /// Leave relative values untouched.
    #[default]
    Unset,
    /// The auditor's own working directory.
    CurrentDir,
    /// The target process's working directory.
    ProcessCwd,
    /// A fixed directory.
    Path(PathBuf),
}

/// A request to resolve a flag to a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagQuery {
    name: String,
    base: BaseDir,
    default: Option<PathBuf>,
}

impl FlagQuery {
    /// Query the flag `name` (without leading dashes).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: BaseDir::Unset,
            default: None,
        }
    }

    /// Resolve relative values against `base`.
    pub fn base(mut self, base: BaseDir) -> Self {
        self.base = base;
        self
    }

    /// Path used when the flag is absent (the process's built-in default).
    pub fn default_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default = Some(path.into());
        self
    }

    /// Flag name without dashes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flag as written on a command line.
    pub fn display_name(&self) -> String {
        format!("--{}", self.name)
    }
}

/// Whether a resolved path is available for checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPresence {
    /// The flag is absent (or empty) and there is no default.
    NotSet,
    /// A path was determined but nothing exists there.
    Missing,
    /// The path exists.
    Present,
}

impl fmt::Display for PathPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPresence::NotSet => write!(f, "not_set"),
            PathPresence::Missing => write!(f, "missing"),
            PathPresence::Present => write!(f, "present"),
        }
    }
}

/// Outcome of resolving a [`FlagQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPath {
    /// Flag name without dashes.
    pub flag: String,
    /// Resolved path; None only when presence is `NotSet`.
    pub path: Option<PathBuf>,
    /// Three-way presence.
    pub presence: PathPresence,
    /// True if the flag appeared in the argument vector.
    pub explicitly_set: bool,
}

impl ResolvedPath {
    /// The path, if it exists on disk.
    pub fn existing(&self) -> Option<&Path> {
        match self.presence {
            PathPresence::Present => self.path.as_deref(),
            _ => None,
        }
    }
}

/// Resolve a flag on `handle` to a path and check whether it exists.
///
/// A single bounded `stat` is made; `NotFound` yields `Missing`, any other
/// failure propagates. Nothing is cached between calls.
pub fn resolve_flag(
    handle: &ProcessHandle,
    query: &FlagQuery,
    bounds: &IoBounds,
) -> Result<ResolvedPath, FlagError> {
    let (raw, explicitly_set) = match handle.flags().get(&query.name) {
        Some(value) => (non_empty(value).map(PathBuf::from), true),
        None => (query.default.clone(), false),
    };

    let Some(raw) = raw else {
        debug!(
            process = %handle.name(),
            flag = %query.name,
            explicitly_set,
            "flag not set"
        );
        return Ok(ResolvedPath {
            flag: query.name.clone(),
            path: None,
            presence: PathPresence::NotSet,
            explicitly_set,
        });
    };

    let path = absolutize(&raw, &query.base, handle, &query.name)?;

    let presence = match bounds.metadata(&path) {
        Ok(_) => PathPresence::Present,
        Err(e) if e.is_not_found() => PathPresence::Missing,
        Err(source) => return Err(FlagError::Stat { path, source }),
    };

    debug!(
        process = %handle.name(),
        flag = %query.name,
        path = %path.display(),
        presence = %presence,
        explicitly_set,
        "flag resolved"
    );

    Ok(ResolvedPath {
        flag: query.name.clone(),
        path: Some(path),
        presence,
        explicitly_set,
    })
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn absolutize(
    raw: &Path,
    base: &BaseDir,
    handle: &ProcessHandle,
    flag: &str,
) -> Result<PathBuf, FlagError> {
    if raw.is_absolute() {
        return Ok(raw.to_path_buf());
    }
    match base {
        BaseDir::Unset => Ok(raw.to_path_buf()),
        BaseDir::CurrentDir => {
            let cwd = std::env::current_dir().map_err(FlagError::CurrentDir)?;
            Ok(cwd.join(raw))
        }
        BaseDir::ProcessCwd => match handle.cwd() {
            Some(cwd) => Ok(cwd.join(raw)),
            None => Err(FlagError::ProcessCwdUnknown {
                flag: flag.to_string(),
                pid: handle.pid(),
            }),
        },
        BaseDir::Path(dir) => Ok(dir.join(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn handle(args: &[&str]) -> ProcessHandle {
        ProcessHandle::new("kubelet", 4242, args.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_equals_and_space_forms() {
        let flags = FlagSet::parse(&[
            "kubelet",
            "--kubeconfig=/etc/kubernetes/kubelet.conf",
            "--config",
            "/var/lib/kubelet/config.yaml",
            "-v=2",
        ]);
        assert_eq!(flags.get("kubeconfig"), Some("/etc/kubernetes/kubelet.conf"));
        assert_eq!(flags.get("config"), Some("/var/lib/kubelet/config.yaml"));
        assert_eq!(flags.get("v"), Some("2"));
        assert_eq!(flags.len(), 3);
    }

    #[test]
    fn test_parse_boolean_flags() {
        let flags = FlagSet::parse(&["kubelet", "--rotate-certificates", "--anonymous-auth=false"]);
        assert_eq!(flags.get("rotate-certificates"), Some(IMPLICIT_TRUE));
        assert_eq!(flags.get("anonymous-auth"), Some("false"));

        let trailing = FlagSet::parse(&["kubelet", "--fail-swap-on"]);
        assert_eq!(trailing.get("fail-swap-on"), Some(IMPLICIT_TRUE));
    }

    #[test]
    fn test_parse_negative_number_value() {
        let flags = FlagSet::parse(&["kube-proxy", "--oom-score-adj", "-999", "--v", "4"]);
        assert_eq!(flags.get("oom-score-adj"), Some("-999"));
        assert_eq!(flags.get("v"), Some("4"));
    }

    #[test]
    fn test_parse_last_occurrence_wins() {
        let flags = FlagSet::parse(&["kubelet", "--config=/a", "--config=/b"]);
        assert_eq!(flags.get("config"), Some("/b"));
    }

    #[test]
    fn test_parse_skips_program_and_positionals() {
        let flags = FlagSet::parse(&["--not-a-flag", "positional", "--x=1", "--", "--y=2"]);
        assert!(!flags.is_set("not-a-flag"));
        assert_eq!(flags.get("x"), Some("1"));
        assert!(!flags.is_set("y"));
    }

    #[test]
    fn test_parse_value_with_equals() {
        let flags = FlagSet::parse(&["kubelet", "--feature-gates=A=true,B=false"]);
        assert_eq!(flags.get("feature-gates"), Some("A=true,B=false"));
    }

    #[test]
    fn test_parse_empty_argv() {
        let empty: [&str; 0] = [];
        assert!(FlagSet::parse(&empty).is_empty());
    }

    #[test]
    fn test_resolve_absent_flag_is_not_set() {
        let h = handle(&["kubelet", "--v=2"]);
        let resolved = resolve_flag(&h, &FlagQuery::new("config"), &IoBounds::default()).unwrap();
        assert_eq!(resolved.presence, PathPresence::NotSet);
        assert!(resolved.path.is_none());
        assert!(!resolved.explicitly_set);
        assert!(resolved.existing().is_none());
    }

    #[test]
    fn test_resolve_empty_value_is_not_set() {
        let h = handle(&["kubelet", "--config="]);
        let resolved = resolve_flag(&h, &FlagQuery::new("config"), &IoBounds::default()).unwrap();
        assert_eq!(resolved.presence, PathPresence::NotSet);
        assert!(resolved.explicitly_set);
    }

    #[test]
    fn test_resolve_present_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("kubelet.conf");
        fs::write(&conf, "apiVersion: v1\n").unwrap();

        let present = format!("--kubeconfig={}", conf.display());
        let missing = format!("--config={}", dir.path().join("nope.yaml").display());
        let h = handle(&["kubelet", &present, &missing]);
        let bounds = IoBounds::default();

        let r = resolve_flag(&h, &FlagQuery::new("kubeconfig"), &bounds).unwrap();
        assert_eq!(r.presence, PathPresence::Present);
        assert_eq!(r.existing(), Some(conf.as_path()));
        assert!(r.explicitly_set);

        let r = resolve_flag(&h, &FlagQuery::new("config"), &bounds).unwrap();
        assert_eq!(r.presence, PathPresence::Missing);
        assert_eq!(r.path, Some(dir.path().join("nope.yaml")));
    }

    #[test]
    fn test_resolve_stat_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("kubelet.conf");
        fs::write(&file, "apiVersion: v1\n").unwrap();
        // A path through a regular file fails with ENOTDIR, not ENOENT.
        let through_file = file.join("child");
        let h = handle(&["kubelet", &format!("--kubeconfig={}", through_file.display())]);

        match resolve_flag(&h, &FlagQuery::new("kubeconfig"), &IoBounds::default()) {
            Err(FlagError::Stat { path, source }) => {
                assert_eq!(path, through_file);
                assert!(!source.is_not_found());
            }
            other => panic!("expected a stat error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_relative_against_fixed_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("proxy.kubeconfig"), "").unwrap();

        let h = handle(&["kube-proxy", "--kubeconfig", "proxy.kubeconfig"]);
        let query = FlagQuery::new("kubeconfig").base(BaseDir::Path(dir.path().to_path_buf()));
        let r = resolve_flag(&h, &query, &IoBounds::default()).unwrap();

        assert_eq!(r.presence, PathPresence::Present);
        assert_eq!(r.path, Some(dir.path().join("proxy.kubeconfig")));
    }

    #[test]
    fn test_resolve_relative_against_process_cwd() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "").unwrap();

        let h = handle(&["kubelet", "--config=config.yaml"]).with_cwd(dir.path());
        let query = FlagQuery::new("config").base(BaseDir::ProcessCwd);
        let r = resolve_flag(&h, &query, &IoBounds::default()).unwrap();
        assert_eq!(r.existing(), Some(dir.path().join("config.yaml").as_path()));
    }

    #[test]
    fn test_resolve_relative_without_process_cwd_errors() {
        let h = handle(&["kubelet", "--config=config.yaml"]);
        let query = FlagQuery::new("config").base(BaseDir::ProcessCwd);
        let err = resolve_flag(&h, &query, &IoBounds::default()).unwrap_err();
        assert!(matches!(err, FlagError::ProcessCwdUnknown { pid: 4242, .. }));
    }

    #[test]
    fn test_resolve_relative_against_current_dir() {
        let h = handle(&["kube-proxy", "--kubeconfig=surely-not-here.kubeconfig"]);
        let query = FlagQuery::new("kubeconfig").base(BaseDir::CurrentDir);
        let r = resolve_flag(&h, &query, &IoBounds::default()).unwrap();
        let expected = std::env::current_dir()
            .unwrap()
            .join("surely-not-here.kubeconfig");
        assert_eq!(r.path, Some(expected));
        assert_eq!(r.presence, PathPresence::Missing);
    }

    #[test]
    fn test_resolve_uses_default_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let default = dir.path().join("config.yaml");
        fs::write(&default, "").unwrap();

        let h = handle(&["kubelet"]);
        let query = FlagQuery::new("config").default_path(&default);
        let r = resolve_flag(&h, &query, &IoBounds::default()).unwrap();
        assert_eq!(r.presence, PathPresence::Present);
        assert!(!r.explicitly_set);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(FlagQuery::new("client-ca-file").display_name(), "--client-ca-file");
    }
}
