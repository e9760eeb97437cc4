//! Configuration loading and validation for nb-core.
//!
//! This module handles:
//! - Config resolution order (CLI > env > XDG > defaults)
//! - TOML parsing into [`NodeBenchConfig`] (shape/type checking via serde)
//! - Semantic validation (non-empty process names, positive timeout)

use crate::bench::{MissingProcessPolicy, ProcessNames};
use crate::bounded::DEFAULT_IO_TIMEOUT_MS;
use crate::benchmarks::BenchPaths;
use crate::predicate::principals::{DEFAULT_GROUP, DEFAULT_PASSWD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a config file.
pub const ENV_CONFIG: &str = "NODE_BENCH_CONFIG";

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "node-bench";

/// Config file name inside the XDG directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid TOML in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for nb_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ValidationError(msg) => nb_common::Error::InvalidConfig(msg),
            other => nb_common::Error::Config(other.to_string()),
        }
    }
}

/// Host files and directories the checks read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostPaths {
    pub proc_root: PathBuf,
    pub passwd: PathBuf,
    pub group: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            passwd: PathBuf::from(DEFAULT_PASSWD),
            group: PathBuf::from(DEFAULT_GROUP),
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeBenchConfig {
    /// Outcome for items whose target process is not running.
    pub missing_process: MissingProcessPolicy,
    /// Bound on each process-table or filesystem call.
    pub timeout_ms: u64,
    pub processes: ProcessNames,
    pub host: HostPaths,
    pub paths: BenchPaths,
}

impl Default for NodeBenchConfig {
    fn default() -> Self {
        Self {
            missing_process: MissingProcessPolicy::default(),
            timeout_ms: DEFAULT_IO_TIMEOUT_MS,
            processes: ProcessNames::default(),
            host: HostPaths::default(),
            paths: BenchPaths::default(),
        }
    }
}

impl NodeBenchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        for (key, name) in [
            ("processes.kubelet", &self.processes.kubelet),
            ("processes.kube_proxy", &self.processes.kube_proxy),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} must not be empty",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` on the command line.
    Flag(PathBuf),
    /// The `NODE_BENCH_CONFIG` environment variable.
    Env(PathBuf),
    /// The XDG config directory.
    Xdg(PathBuf),
    /// No file; built-in defaults.
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Flag(p) | ConfigSource::Env(p) | ConfigSource::Xdg(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Flag(p) => write!(f, "--config {}", p.display()),
            ConfigSource::Env(p) => write!(f, "{} {}", ENV_CONFIG, p.display()),
            ConfigSource::Xdg(p) => write!(f, "{}", p.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: NodeBenchConfig,
    pub source: ConfigSource,
}

/// Configuration resolution options.
#[derive(Debug, Default)]
pub struct ConfigOptions {
    /// Explicit config file path (highest priority).
    pub config_path: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit CLI flag (via ConfigOptions)
/// 2. Environment variable (NODE_BENCH_CONFIG)
/// 3. XDG config home (~/.config/node-bench/config.toml)
/// 4. Built-in defaults
///
/// A file named by 1 or 2 must exist. A missing XDG file means defaults.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    load_config_with(options, |key| std::env::var(key).ok())
}

/// [`load_config`] with an injectable environment.
pub fn load_config_with<F>(options: &ConfigOptions, env: F) -> Result<ResolvedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let source = resolve_source(options, &env);
    let config = match &source {
        ConfigSource::Flag(path) | ConfigSource::Env(path) => load_from_file(path)?,
        ConfigSource::Xdg(path) if path.exists() => load_from_file(path)?,
        ConfigSource::Xdg(_) | ConfigSource::Defaults => NodeBenchConfig::default(),
    };
    config.validate()?;

    let source = match source {
        ConfigSource::Xdg(path) if !path.exists() => ConfigSource::Defaults,
        other => other,
    };
    Ok(ResolvedConfig { config, source })
}

fn resolve_source<F>(options: &ConfigOptions, env: &F) -> ConfigSource
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = &options.config_path {
        return ConfigSource::Flag(path.clone());
    }

    if let Some(path) = env(ENV_CONFIG).filter(|p| !p.is_empty()) {
        return ConfigSource::Env(PathBuf::from(path));
    }

    let xdg_config = env("XDG_CONFIG_HOME")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")));

    match xdg_config {
        Some(dir) => ConfigSource::Xdg(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)),
        None => ConfigSource::Defaults,
    }
}

/// Load a config file.
pub fn load_from_file(path: &Path) -> Result<NodeBenchConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::IoError {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = NodeBenchConfig::default();
        assert_eq!(config.missing_process, MissingProcessPolicy::Skip);
        assert_eq!(config.timeout(), Duration::from_millis(5000));
        assert_eq!(config.processes.kube_proxy, "kube-proxy");
        assert_eq!(config.host.proc_root, PathBuf::from("/proc"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "missing_process = \"fail\"\n[processes]\nkubelet = \"hyperkube\"\n",
        )
        .unwrap();

        let options = ConfigOptions {
            config_path: Some(path.clone()),
        };
        let resolved = load_config_with(&options, no_env).unwrap();
        assert_eq!(resolved.source, ConfigSource::Flag(path));
        assert_eq!(resolved.config.missing_process, MissingProcessPolicy::Fail);
        assert_eq!(resolved.config.processes.kubelet, "hyperkube");
        assert_eq!(resolved.config.processes.kube_proxy, "kube-proxy");
        assert_eq!(resolved.config.timeout_ms, 5000);
    }

    #[test]
    fn test_flag_beats_env() {
        let dir = tempfile::tempdir().unwrap();
        let flag = dir.path().join("flag.toml");
        let env_file = dir.path().join("env.toml");
        fs::write(&flag, "timeout_ms = 100\n").unwrap();
        fs::write(&env_file, "timeout_ms = 200\n").unwrap();
        let env_path = env_file.to_string_lossy().to_string();

        let env = |key: &str| (key == ENV_CONFIG).then(|| env_path.clone());
        let resolved = load_config_with(
            &ConfigOptions {
                config_path: Some(flag),
            },
            env,
        )
        .unwrap();
        assert_eq!(resolved.config.timeout_ms, 100);

        let resolved = load_config_with(&ConfigOptions::default(), env).unwrap();
        assert_eq!(resolved.config.timeout_ms, 200);
        assert!(matches!(resolved.source, ConfigSource::Env(_)));
    }

    #[test]
    fn test_missing_xdg_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let xdg = dir.path().to_string_lossy().to_string();
        let env = |key: &str| (key == "XDG_CONFIG_HOME").then(|| xdg.clone());
        let resolved = load_config_with(&ConfigOptions::default(), env).unwrap();
        assert_eq!(resolved.source, ConfigSource::Defaults);
        assert_eq!(resolved.config, NodeBenchConfig::default());
    }

    #[test]
    fn test_xdg_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("node-bench").join("config.toml");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "[paths]\nkubelet_service_dir = \"/opt/kubelet.d\"\n").unwrap();
        let xdg = dir.path().to_string_lossy().to_string();
        let env = |key: &str| (key == "XDG_CONFIG_HOME").then(|| xdg.clone());

        let resolved = load_config_with(&ConfigOptions::default(), env).unwrap();
        assert_eq!(resolved.source, ConfigSource::Xdg(file));
        assert_eq!(
            resolved.config.paths.kubelet_service_dir,
            PathBuf::from("/opt/kubelet.d")
        );
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let options = ConfigOptions {
            config_path: Some(PathBuf::from("/nonexistent/node-bench.toml")),
        };
        let err = load_config_with(&options, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "missing_process = \"sometimes\"\n").unwrap();
        let err = load_config_with(
            &ConfigOptions {
                config_path: Some(path),
            },
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.toml");
        fs::write(&path, "timeout = 10\n").unwrap();
        assert!(load_from_file(&path).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = NodeBenchConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        config.timeout_ms = 10;
        config.processes.kubelet = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("processes.kubelet"));

        let common: nb_common::Error = err.into();
        assert!(matches!(common, nb_common::Error::InvalidConfig(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = NodeBenchConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("missing_process = \"skip\""));
        let back: NodeBenchConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
