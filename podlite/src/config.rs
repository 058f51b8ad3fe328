//! Runtime shim configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use podlite_shared::constants::files;
use podlite_shared::errors::{PodliteError, PodliteResult};

/// Cgroup manager used to account a sandbox's containers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CgroupManager {
    /// Plain cgroupfs paths.
    #[default]
    Cgroupfs,

    /// systemd slice/scope management.
    Systemd,
}

impl CgroupManager {
    /// Manager name as passed to the cgroup annotator.
    pub fn as_str(&self) -> &'static str {
        match self {
            CgroupManager::Cgroupfs => podlite_shared::constants::cgroup::CGROUPFS_CGROUP_MANAGER,
            CgroupManager::Systemd => podlite_shared::constants::cgroup::SYSTEMD_CGROUP_MANAGER,
        }
    }
}

impl std::fmt::Display for CgroupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// TLS material locations for the streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamTlsFiles {
    /// Server certificate path.
    pub cert: PathBuf,

    /// Private key path.
    pub key: PathBuf,

    /// Client CA bundle path; when set, client certificates are required.
    #[serde(default)]
    pub ca: Option<PathBuf>,
}

/// Node-local configuration for the shim.
///
/// Loaded once at startup and replaced atomically on reload; readers take a
/// snapshot under the process-wide read-mostly lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShimConfig {
    /// Root directory for persisted shim state.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Directory watched for container exit notification files.
    /// Defaults to `<root_dir>/exits`.
    #[serde(default)]
    pub exits_dir: Option<PathBuf>,

    /// Shutdown marker path. Defaults to `<root_dir>/podlite.shutdown`.
    #[serde(default)]
    pub shutdown_marker: Option<PathBuf>,

    /// Cgroup manager accounting sandbox containers.
    #[serde(default)]
    pub cgroup_manager: CgroupManager,

    /// Mount directory probed for parent-cgroup memory limits.
    #[serde(default = "default_cgroup_mount_dir")]
    pub cgroup_mount_dir: PathBuf,

    /// Image backing infra containers.
    #[serde(default = "default_pause_image")]
    pub pause_image: String,

    /// Grace period granted to containers when stopping, in seconds.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: i64,

    /// Address the streaming endpoints are served on.
    #[serde(default = "default_stream_address")]
    pub stream_address: String,

    /// TLS material for the streaming server, if enabled.
    #[serde(default)]
    pub stream_tls: Option<StreamTlsFiles>,
}

fn default_root_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".podlite"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/podlite"))
}

fn default_cgroup_mount_dir() -> PathBuf {
    PathBuf::from("/sys/fs/cgroup/memory")
}

fn default_pause_image() -> String {
    "registry.k8s.io/pause:3.9".to_string()
}

fn default_stop_timeout() -> i64 {
    10
}

fn default_stream_address() -> String {
    "127.0.0.1:10010".to_string()
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            exits_dir: None,
            shutdown_marker: None,
            cgroup_manager: CgroupManager::default(),
            cgroup_mount_dir: default_cgroup_mount_dir(),
            pause_image: default_pause_image(),
            stop_timeout: default_stop_timeout(),
            stream_address: default_stream_address(),
            stream_tls: None,
        }
    }
}

impl ShimConfig {
    /// Directory watched for container exit notifications.
    pub fn exits_dir(&self) -> PathBuf {
        self.exits_dir
            .clone()
            .unwrap_or_else(|| self.root_dir.join(files::EXITS_DIR))
    }

    /// Path of the persisted shutdown marker.
    pub fn shutdown_marker(&self) -> PathBuf {
        self.shutdown_marker
            .clone()
            .unwrap_or_else(|| self.root_dir.join(files::SHUTDOWN_MARKER))
    }

    /// Load and validate a configuration from a JSON file.
    pub fn load(path: &Path) -> PodliteResult<Self> {
        let data = std::fs::read(path).map_err(|e| {
            PodliteError::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_slice(&data).map_err(|e| {
            PodliteError::Config(format!("failed to parse config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that would otherwise fail far from their cause.
    pub fn validate(&self) -> PodliteResult<()> {
        if !self.root_dir.is_absolute() {
            return Err(PodliteError::Config(format!(
                "root_dir must be an absolute path, got {}",
                self.root_dir.display()
            )));
        }
        if self.stop_timeout <= 0 {
            return Err(PodliteError::Config(format!(
                "stop_timeout must be positive, got {}",
                self.stop_timeout
            )));
        }
        Ok(())
    }
}
