//! Container objects and their persisted runtime state.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use podlite_shared::constants::files;
use podlite_shared::errors::{PodliteError, PodliteResult};

/// Lifecycle status reported for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Created but not yet started.
    #[default]
    Created,

    /// Process is running.
    Running,

    /// Process is paused.
    Paused,

    /// Process has exited.
    Stopped,

    /// Cannot determine the container state (error recovery).
    Unknown,
}

impl ContainerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ContainerStatus::Stopped)
    }

    /// Convert to string for persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Running => "running",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for ContainerStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ContainerStatus::Created),
            "running" => Ok(ContainerStatus::Running),
            "paused" => Ok(ContainerStatus::Paused),
            "stopped" => Ok(ContainerStatus::Stopped),
            "unknown" => Ok(ContainerStatus::Unknown),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dynamic container state, persisted to the run directory.
///
/// Mutated only by the OCI runtime adapter's status query or by the exit
/// monitor reacting to an exit notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerState {
    /// Current lifecycle status.
    pub status: ContainerStatus,

    /// Process ID reported by the runtime (None when not running).
    pub pid: Option<u32>,

    /// Exit code once the process has finished.
    pub exit_code: Option<i32>,

    /// When the process was started.
    pub started_at: Option<DateTime<Utc>>,

    /// When the process finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl ContainerState {
    /// Initial state for a freshly created container.
    pub fn new() -> Self {
        Self {
            status: ContainerStatus::Created,
            pid: None,
            exit_code: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Record that the process has been started.
    pub fn mark_running(&mut self) {
        self.status = ContainerStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Record that the process has exited.
    pub fn mark_stopped(&mut self, exit_code: Option<i32>) {
        self.status = ContainerStatus::Stopped;
        self.pid = None;
        self.exit_code = exit_code;
        self.finished_at = Some(Utc::now());
    }
}

impl Default for ContainerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable container configuration, persisted alongside the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Unique container identifier. For infra containers this equals the
    /// sandbox identifier: they name the same storage record.
    pub id: String,

    /// Reserved human-readable name.
    pub name: String,

    /// Identifier of the owning sandbox.
    pub sandbox_id: String,

    /// Image reference backing the container.
    pub image: String,

    /// Storage-assigned run directory holding persisted records.
    pub run_dir: PathBuf,

    /// Log file for the container process, if any.
    pub log_path: Option<PathBuf>,

    /// Cgroup path derived at creation time.
    pub cgroup_path: String,

    /// True for the sandbox's infra container.
    pub infra: bool,

    /// Creation timestamp (UTC).
    pub created_at: DateTime<Utc>,
}

impl ContainerConfig {
    /// Persist the configuration into its run directory.
    pub fn to_disk(&self) -> PodliteResult<()> {
        let path = self.run_dir.join(files::CONFIG);
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| PodliteError::Internal(format!("failed to encode container config: {e}")))?;
        std::fs::write(&path, data).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to write container config {}: {e}",
                path.display()
            ))
        })
    }

    /// Read a persisted configuration from a run directory.
    pub fn from_disk(run_dir: &Path) -> PodliteResult<Self> {
        let path = run_dir.join(files::CONFIG);
        let data = std::fs::read(&path).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to read container config {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_slice(&data).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to parse container config {}: {e}",
                path.display()
            ))
        })
    }
}

/// One OCI-runtime-managed process, either a sandbox's infra container or a
/// workload container.
#[derive(Debug)]
pub struct Container {
    config: ContainerConfig,
    state: RwLock<ContainerState>,
}

impl Container {
    /// Create a container in the initial `Created` state.
    pub fn new(config: ContainerConfig) -> Self {
        Self::with_state(config, ContainerState::new())
    }

    /// Create a container with a known state (used by restore).
    pub fn with_state(config: ContainerConfig, state: ContainerState) -> Self {
        Self {
            config,
            state: RwLock::new(state),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn sandbox_id(&self) -> &str {
        &self.config.sandbox_id
    }

    pub fn image(&self) -> &str {
        &self.config.image
    }

    pub fn run_dir(&self) -> &Path {
        &self.config.run_dir
    }

    pub fn cgroup_path(&self) -> &str {
        &self.config.cgroup_path
    }

    pub fn is_infra(&self) -> bool {
        self.config.infra
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.config.created_at
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PodliteResult<ContainerState> {
        let state = self
            .state
            .read()
            .map_err(|e| PodliteError::Internal(format!("container state lock poisoned: {e}")))?;
        Ok(state.clone())
    }

    /// Replace the current state.
    pub fn set_state(&self, new_state: ContainerState) -> PodliteResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| PodliteError::Internal(format!("container state lock poisoned: {e}")))?;
        *state = new_state;
        Ok(())
    }

    /// Persist the current state into the run directory.
    pub fn state_to_disk(&self) -> PodliteResult<()> {
        let state = self.state()?;
        let path = self.config.run_dir.join(files::STATE);
        let data = serde_json::to_vec_pretty(&state)
            .map_err(|e| PodliteError::Internal(format!("failed to encode container state: {e}")))?;
        std::fs::write(&path, data).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to write container state {}: {e}",
                path.display()
            ))
        })
    }

    /// Read a persisted state from a run directory.
    pub fn state_from_disk(run_dir: &Path) -> PodliteResult<ContainerState> {
        let path = run_dir.join(files::STATE);
        let data = std::fs::read(&path).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to read container state {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_slice(&data).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to parse container state {}: {e}",
                path.display()
            ))
        })
    }
}
