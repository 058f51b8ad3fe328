//! Sandbox objects: one pod's shared namespaces plus its infra container.

pub mod container;

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use podlite_shared::constants::files;
use podlite_shared::errors::{PodliteError, PodliteResult};

use container::Container;

/// Immutable sandbox configuration, persisted to the run directory so the
/// sandbox can be reloaded after a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Unique sandbox identifier. Also the infra container's identifier.
    pub id: String,

    /// Reserved pod name (`namespace_name_uid_attempt`).
    pub name: String,

    /// Kubernetes namespace of the pod.
    pub namespace: String,

    /// Pod UID supplied by the orchestrator.
    pub uid: String,

    /// Attempt counter supplied by the orchestrator.
    pub attempt: u32,

    /// Directory the pod's container logs are written under.
    pub log_dir: PathBuf,

    /// Requested cgroup parent, as derived at creation time.
    pub cgroup_parent: String,

    /// Pod shares the host network namespace.
    pub host_network: bool,

    /// Pod shares the host IPC namespace.
    pub host_ipc: bool,

    /// Network namespace path handed to the network plugin.
    /// Required unless `host_network`.
    pub netns_path: Option<String>,

    /// Storage-assigned run directory holding persisted records.
    pub run_dir: PathBuf,

    /// Infra container image.
    pub image: String,

    /// Creation timestamp (UTC).
    pub created_at: DateTime<Utc>,
}

impl SandboxConfig {
    /// Persist the configuration into its run directory.
    pub fn to_disk(&self) -> PodliteResult<()> {
        let path = self.run_dir.join(files::CONFIG);
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| PodliteError::Internal(format!("failed to encode sandbox config: {e}")))?;
        std::fs::write(&path, data).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to write sandbox config {}: {e}",
                path.display()
            ))
        })
    }

    /// Read a persisted configuration from a run directory.
    pub fn from_disk(run_dir: &Path) -> PodliteResult<Self> {
        let path = run_dir.join(files::CONFIG);
        let data = std::fs::read(&path).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to read sandbox config {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_slice(&data).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to parse sandbox config {}: {e}",
                path.display()
            ))
        })
    }
}

/// One pod's shared network/IPC namespace environment and its infra
/// container.
///
/// Owned exclusively by the lifecycle controller's registry; background
/// tasks hold lookup keys, never references that can outlive removal.
#[derive(Debug)]
pub struct Sandbox {
    config: SandboxConfig,
    ips: RwLock<Vec<IpAddr>>,
    infra: RwLock<Option<Arc<Container>>>,
    stopped: AtomicBool,
}

impl Sandbox {
    /// Create a sandbox from its configuration, not yet stopped.
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            ips: RwLock::new(Vec::new()),
            infra: RwLock::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn log_dir(&self) -> &Path {
        &self.config.log_dir
    }

    pub fn run_dir(&self) -> &Path {
        &self.config.run_dir
    }

    pub fn host_network(&self) -> bool {
        self.config.host_network
    }

    pub fn netns_path(&self) -> Option<&str> {
        self.config.netns_path.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.config.created_at
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Whether the sandbox has been stopped.
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Mark the sandbox stopped. One-way: there is no transition back.
    pub fn set_stopped(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Record an IP address assigned by the network plugin.
    pub fn add_ip(&self, ip: IpAddr) -> PodliteResult<()> {
        let mut ips = self
            .ips
            .write()
            .map_err(|e| PodliteError::Internal(format!("sandbox ip lock poisoned: {e}")))?;
        if !ips.contains(&ip) {
            ips.push(ip);
        }
        Ok(())
    }

    /// IP addresses currently assigned to the sandbox.
    pub fn ips(&self) -> PodliteResult<Vec<IpAddr>> {
        let ips = self
            .ips
            .read()
            .map_err(|e| PodliteError::Internal(format!("sandbox ip lock poisoned: {e}")))?;
        Ok(ips.clone())
    }

    /// Attach the infra container reference.
    pub fn set_infra(&self, container: Arc<Container>) -> PodliteResult<()> {
        let mut infra = self
            .infra
            .write()
            .map_err(|e| PodliteError::Internal(format!("sandbox infra lock poisoned: {e}")))?;
        *infra = Some(container);
        Ok(())
    }

    /// The sandbox's infra container, if attached.
    pub fn infra_container(&self) -> PodliteResult<Option<Arc<Container>>> {
        let infra = self
            .infra
            .read()
            .map_err(|e| PodliteError::Internal(format!("sandbox infra lock poisoned: {e}")))?;
        Ok(infra.clone())
    }
}
