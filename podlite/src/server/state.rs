//! In-memory state the lifecycle controller delegates to.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use podlite_shared::errors::{PodliteError, PodliteResult};

use crate::registry::{IdIndex, NameRegistry};
use crate::sandbox::Sandbox;
use crate::sandbox::container::Container;

/// Registry bundle owned by the lifecycle controller.
///
/// Sandbox and container maps plus name/ID reservations, each guarded
/// individually. No caller ever sees a raw map: reads are concurrent,
/// writes serialized, and no lookup can observe a partial add or remove.
#[derive(Debug, Default)]
pub struct ContainerServer {
    sandboxes: RwLock<HashMap<String, Arc<Sandbox>>>,
    containers: RwLock<HashMap<String, Arc<Container>>>,
    pub(crate) sandbox_names: NameRegistry,
    pub(crate) container_names: NameRegistry,
    pub(crate) sandbox_ids: IdIndex,
    pub(crate) container_ids: IdIndex,
}

impl ContainerServer {
    /// Create an empty state bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sandbox.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if a sandbox with this identifier is
    /// registered.
    pub fn add_sandbox(&self, sandbox: Arc<Sandbox>) -> PodliteResult<()> {
        let mut sandboxes = self
            .sandboxes
            .write()
            .map_err(|e| PodliteError::Internal(format!("sandbox map lock poisoned: {e}")))?;

        if sandboxes.contains_key(sandbox.id()) {
            return Err(PodliteError::AlreadyExists(format!(
                "sandbox {}",
                sandbox.id()
            )));
        }

        tracing::debug!(sandbox_id = %sandbox.id(), name = %sandbox.name(), "registering sandbox");
        sandboxes.insert(sandbox.id().to_string(), sandbox);
        Ok(())
    }

    /// Sandbox registered under `id`, if any. Exact match only.
    pub fn get_sandbox(&self, id: &str) -> PodliteResult<Option<Arc<Sandbox>>> {
        let sandboxes = self
            .sandboxes
            .read()
            .map_err(|e| PodliteError::Internal(format!("sandbox map lock poisoned: {e}")))?;
        Ok(sandboxes.get(id).cloned())
    }

    /// Remove and return the sandbox registered under `id`.
    pub fn remove_sandbox(&self, id: &str) -> PodliteResult<Option<Arc<Sandbox>>> {
        let mut sandboxes = self
            .sandboxes
            .write()
            .map_err(|e| PodliteError::Internal(format!("sandbox map lock poisoned: {e}")))?;

        let removed = sandboxes.remove(id);
        if removed.is_some() {
            tracing::debug!(sandbox_id = %id, "removed sandbox from registry");
        }
        Ok(removed)
    }

    /// All registered sandboxes.
    pub fn list_sandboxes(&self) -> PodliteResult<Vec<Arc<Sandbox>>> {
        let sandboxes = self
            .sandboxes
            .read()
            .map_err(|e| PodliteError::Internal(format!("sandbox map lock poisoned: {e}")))?;
        Ok(sandboxes.values().cloned().collect())
    }

    /// Register a workload container.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if a container with this identifier is
    /// registered.
    pub fn add_container(&self, container: Arc<Container>) -> PodliteResult<()> {
        let mut containers = self
            .containers
            .write()
            .map_err(|e| PodliteError::Internal(format!("container map lock poisoned: {e}")))?;

        if containers.contains_key(container.id()) {
            return Err(PodliteError::AlreadyExists(format!(
                "container {}",
                container.id()
            )));
        }

        tracing::debug!(
            container_id = %container.id(),
            sandbox_id = %container.sandbox_id(),
            "registering container"
        );
        containers.insert(container.id().to_string(), container);
        Ok(())
    }

    /// Workload container registered under `id`, if any. Exact match only;
    /// infra containers are reached through their sandbox.
    pub fn get_container(&self, id: &str) -> PodliteResult<Option<Arc<Container>>> {
        let containers = self
            .containers
            .read()
            .map_err(|e| PodliteError::Internal(format!("container map lock poisoned: {e}")))?;
        Ok(containers.get(id).cloned())
    }

    /// Remove and return the workload container registered under `id`.
    pub fn remove_container(&self, id: &str) -> PodliteResult<Option<Arc<Container>>> {
        let mut containers = self
            .containers
            .write()
            .map_err(|e| PodliteError::Internal(format!("container map lock poisoned: {e}")))?;

        let removed = containers.remove(id);
        if removed.is_some() {
            tracing::debug!(container_id = %id, "removed container from registry");
        }
        Ok(removed)
    }

    /// All registered workload containers.
    pub fn list_containers(&self) -> PodliteResult<Vec<Arc<Container>>> {
        let containers = self
            .containers
            .read()
            .map_err(|e| PodliteError::Internal(format!("container map lock poisoned: {e}")))?;
        Ok(containers.values().cloned().collect())
    }

    /// Workload containers belonging to `sandbox_id`.
    pub fn containers_for_sandbox(&self, sandbox_id: &str) -> PodliteResult<Vec<Arc<Container>>> {
        let containers = self
            .containers
            .read()
            .map_err(|e| PodliteError::Internal(format!("container map lock poisoned: {e}")))?;
        Ok(containers
            .values()
            .filter(|c| c.sandbox_id() == sandbox_id)
            .cloned()
            .collect())
    }
}
