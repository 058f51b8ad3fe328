//! The sandbox lifecycle controller.
//!
//! [`PodServer`] orchestrates RunPodSandbox / StopPodSandbox /
//! RemovePodSandbox by sequencing the storage backend, the OCI runtime and
//! the network plugin in a fixed order, unwinding already-completed steps
//! on failure. It owns a [`ContainerServer`] registry bundle and forwards
//! all state access to it explicitly.

mod config_watch;
mod diagnostics;
mod exit_monitor;
mod remove;
mod restore;
mod run;
mod shutdown;
mod state;
mod status;
mod stop;

pub use config_watch::ConfigWatcher;
pub use exit_monitor::ExitMonitor;
pub use run::{PodSandboxConfig, PodSandboxMetadata};
pub use state::ContainerServer;
pub use status::{PodSandboxState, PodSandboxStatus};

pub(crate) use diagnostics::CleanupLog;

use std::sync::{Arc, RwLock};

use podlite_shared::errors::{PodliteError, PodliteResult};

use crate::config::ShimConfig;
use crate::net::NetworkPlugin;
use crate::oci::OciRuntime;
use crate::sandbox::Sandbox;
use crate::sandbox::container::Container;
use crate::storage::SandboxStore;

/// The lifecycle controller serving CRI sandbox and container operations.
///
/// One `PodServer` exists per process. Construction reconciles persisted
/// storage records into memory and honors a pending shutdown marker before
/// any call is served; the exit monitor and config watcher are started
/// separately and run for the life of the process.
pub struct PodServer {
    config: RwLock<ShimConfig>,
    state: ContainerServer,
    storage: Arc<dyn SandboxStore>,
    runtime: Arc<dyn OciRuntime>,
    network: Arc<dyn NetworkPlugin>,
}

impl PodServer {
    /// Build the server and reconcile persisted state.
    ///
    /// Reconciliation is never fatal: unloadable entities are deleted and
    /// startup proceeds with a reduced, consistent working set.
    pub async fn new(
        config: ShimConfig,
        storage: Arc<dyn SandboxStore>,
        runtime: Arc<dyn OciRuntime>,
        network: Arc<dyn NetworkPlugin>,
    ) -> PodliteResult<Arc<Self>> {
        config.validate()?;

        std::fs::create_dir_all(&config.root_dir).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to create state root {}: {e}",
                config.root_dir.display()
            ))
        })?;
        let exits_dir = config.exits_dir();
        std::fs::create_dir_all(&exits_dir).map_err(|e| {
            PodliteError::Storage(format!(
                "failed to create exits directory {}: {e}",
                exits_dir.display()
            ))
        })?;

        let server = Arc::new(Self {
            config: RwLock::new(config),
            state: ContainerServer::new(),
            storage,
            runtime,
            network,
        });

        server.restore().await;
        server.cleanup_sandboxes_on_shutdown().await;

        tracing::debug!(
            sandboxes = server.state.list_sandboxes()?.len(),
            "lifecycle controller ready"
        );
        Ok(server)
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> PodliteResult<ShimConfig> {
        let config = self
            .config
            .read()
            .map_err(|e| PodliteError::Internal(format!("config lock poisoned: {e}")))?;
        Ok(config.clone())
    }

    /// Replace the configuration (used by the reload watcher).
    pub(crate) fn replace_config(&self, new_config: ShimConfig) -> PodliteResult<()> {
        new_config.validate()?;
        let mut config = self
            .config
            .write()
            .map_err(|e| PodliteError::Internal(format!("config lock poisoned: {e}")))?;
        *config = new_config;
        Ok(())
    }

    /// The registry bundle. State access goes through this object only.
    pub fn state(&self) -> &ContainerServer {
        &self.state
    }

    /// Resolve a client-supplied (possibly partial) sandbox identifier to
    /// the registered sandbox.
    pub(crate) fn sandbox_from_request(&self, id: &str) -> PodliteResult<Arc<Sandbox>> {
        if id.is_empty() {
            return Err(PodliteError::Validation(
                "sandbox identifier is empty".to_string(),
            ));
        }
        let full_id = self.state.sandbox_ids.resolve(id)?;
        self.state
            .get_sandbox(&full_id)?
            .ok_or_else(|| PodliteError::NotFound(format!("sandbox {full_id}")))
    }

    /// Resolve a client-supplied (possibly partial) container identifier to
    /// the registered workload container.
    pub(crate) fn container_from_request(&self, id: &str) -> PodliteResult<Arc<Container>> {
        if id.is_empty() {
            return Err(PodliteError::Validation(
                "container identifier is empty".to_string(),
            ));
        }
        let full_id = self.state.container_ids.resolve(id)?;
        self.state
            .get_container(&full_id)?
            .ok_or_else(|| PodliteError::NotFound(format!("container {full_id}")))
    }
}

impl std::fmt::Debug for PodServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodServer").finish()
    }
}
