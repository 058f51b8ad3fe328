//! Startup reconciliation of storage records with loadable state.
//!
//! A crash can leave storage records referencing containers whose
//! kernel-level resources are gone. Reconciliation must never leave a
//! dangling record without a usable in-memory object, because every later
//! operation indexes purely through the in-memory registries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use podlite_shared::constants::naming;
use podlite_shared::errors::{PodliteError, PodliteResult};

use crate::net::PodNetworkSpec;
use crate::sandbox::container::{Container, ContainerConfig, ContainerStatus};
use crate::sandbox::{Sandbox, SandboxConfig};
use crate::storage::RuntimeContainerMetadata;
use crate::util::is_process_alive;

use super::PodServer;

impl PodServer {
    /// Reconcile the storage backend's records into the in-memory
    /// registries. Runs exactly once, before the server accepts calls.
    /// Never fatal: offending entities are deleted and startup proceeds
    /// with a reduced, consistent working set.
    pub(crate) async fn restore(&self) {
        let entries = match self.storage.containers().await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "could not read containers and sandboxes");
                return;
            }
        };

        let mut pods: HashMap<String, RuntimeContainerMetadata> = HashMap::new();
        let mut pod_containers: HashMap<String, RuntimeContainerMetadata> = HashMap::new();
        let mut names: HashMap<String, Vec<String>> = HashMap::new();
        for entry in &entries {
            let metadata = match self.storage.get_container_metadata(&entry.id).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::warn!(id = %entry.id, error = %err, "error parsing metadata, ignoring");
                    continue;
                }
            };
            names.insert(entry.id.clone(), entry.names.clone());
            if metadata.pod {
                pods.insert(entry.id.clone(), metadata);
            } else {
                pod_containers.insert(entry.id.clone(), metadata);
            }
        }

        // Load each pod; a pod that cannot be restored is deleted together
        // with every container associated with it, and all names released.
        let mut deleted_pods: HashSet<String> = HashSet::new();
        for sandbox_id in pods.keys() {
            match self.load_sandbox(sandbox_id).await {
                Ok(()) => continue,
                Err(err) => {
                    tracing::warn!(sandbox_id = %sandbox_id, error = %err, "could not restore sandbox");
                }
            }

            for name in names.get(sandbox_id).into_iter().flatten() {
                self.delete_storage_record(name).await;
                self.release_restored_name(name);
            }

            tracing::warn!(
                sandbox_id = %sandbox_id,
                "deleting all containers under sandbox since it could not be restored"
            );
            for (container_id, metadata) in &pod_containers {
                if metadata.pod_id != *sandbox_id {
                    continue;
                }
                for name in names.get(container_id).into_iter().flatten() {
                    self.delete_storage_record(name).await;
                    if let Err(err) = self.state.container_names.release(name) {
                        tracing::warn!(name = %name, error = %err, "unable to release container name");
                    }
                }
            }
            deleted_pods.insert(sandbox_id.clone());
        }

        // Load the remaining workload containers.
        for (container_id, metadata) in &pod_containers {
            if deleted_pods.contains(&metadata.pod_id) {
                continue;
            }
            if let Err(err) = self.load_container(container_id, metadata).await {
                tracing::warn!(container_id = %container_id, error = %err, "could not restore container");
                for name in names.get(container_id).into_iter().flatten() {
                    self.delete_storage_record(name).await;
                    if let Err(err) = self.state.container_names.release(name) {
                        tracing::warn!(name = %name, error = %err, "unable to release container name");
                    }
                }
            }
        }

        // Recover sandbox IPs. A failure keeps the sandbox with unknown
        // IP state; it is not a reason to remove it.
        for sandbox in self.state.list_sandboxes().unwrap_or_default() {
            if sandbox.host_network() {
                continue;
            }
            match self
                .network
                .pod_ip(&PodNetworkSpec::for_sandbox(&sandbox))
                .await
            {
                Ok(ip) => {
                    if let Err(err) = sandbox.add_ip(ip) {
                        tracing::warn!(sandbox_id = %sandbox.id(), error = %err, "unable to record sandbox IP");
                    }
                }
                Err(err) => {
                    tracing::warn!(sandbox_id = %sandbox.id(), error = %err, "could not restore sandbox IP");
                }
            }
        }
    }

    /// Load one sandbox from its persisted records into the registries.
    ///
    /// Requires the sandbox config, the infra container state and the
    /// network state to load. Partial name reservations left behind by a
    /// failure are released by the caller's deletion pass.
    async fn load_sandbox(&self, id: &str) -> PodliteResult<()> {
        let metadata = self.storage.get_container_metadata(id).await?;
        if !metadata.pod {
            return Err(PodliteError::Internal(format!(
                "record {id} is not a pod sandbox"
            )));
        }

        let config = SandboxConfig::from_disk(&metadata.run_dir)?;
        if !config.host_network && config.netns_path.is_none() {
            return Err(PodliteError::InvalidState(format!(
                "sandbox {id} has no recorded network namespace"
            )));
        }

        let mut state = Container::state_from_disk(&metadata.run_dir)?;
        // A crash can leave a running record behind a dead process.
        if state.status == ContainerStatus::Running
            && !state.pid.map(is_process_alive).unwrap_or(false)
        {
            tracing::warn!(
                sandbox_id = %id,
                pid = ?state.pid,
                "infra container recorded as running but process is gone"
            );
            state.mark_stopped(None);
        }

        self.state.sandbox_names.reserve(&config.name, id)?;
        let infra_name = format!("{}{}", config.name, naming::INFRA_SUFFIX);
        self.state.container_names.reserve(&infra_name, id)?;
        self.state.sandbox_ids.reserve(id)?;
        self.state.container_ids.reserve(id)?;

        let infra = Arc::new(Container::with_state(
            ContainerConfig {
                id: id.to_string(),
                name: infra_name,
                sandbox_id: id.to_string(),
                image: config.image.clone(),
                run_dir: config.run_dir.clone(),
                log_path: Some(config.log_dir.join(format!("{id}.log"))),
                cgroup_path: String::new(),
                infra: true,
                created_at: config.created_at,
            },
            state.clone(),
        ));
        let sandbox = Arc::new(Sandbox::new(config));
        sandbox.set_infra(infra)?;
        if !state.status.is_running() {
            sandbox.set_stopped();
        }
        self.state.add_sandbox(sandbox)?;

        tracing::debug!(sandbox_id = %id, "restored sandbox");
        Ok(())
    }

    /// Load one workload container from its persisted records.
    async fn load_container(
        &self,
        id: &str,
        metadata: &RuntimeContainerMetadata,
    ) -> PodliteResult<()> {
        let config = ContainerConfig::from_disk(&metadata.run_dir)?;

        // Every container belongs to exactly one registered sandbox.
        self.state
            .get_sandbox(&metadata.pod_id)?
            .ok_or_else(|| {
                PodliteError::NotFound(format!("sandbox {} for container {id}", metadata.pod_id))
            })?;

        let state = Container::state_from_disk(&metadata.run_dir)?;

        self.state.container_names.reserve(&config.name, id)?;
        self.state.container_ids.reserve(id)?;
        self.state
            .add_container(Arc::new(Container::with_state(config, state)))?;

        tracing::debug!(container_id = %id, "restored container");
        Ok(())
    }

    /// Delete one storage record by name, warning on failure.
    async fn delete_storage_record(&self, name: &str) {
        if let Err(err) = self.storage.delete_container(name).await {
            tracing::warn!(name = %name, error = %err, "unable to delete container record");
        }
    }

    /// Release a restored name into the registry it belongs to: infra
    /// container names go back to the container registry, pod names to the
    /// sandbox registry.
    fn release_restored_name(&self, name: &str) {
        let result = if name.contains(naming::INFRA_SUFFIX) {
            self.state.container_names.release(name)
        } else {
            self.state.sandbox_names.release(name)
        };
        if let Err(err) = result {
            tracing::warn!(name = %name, error = %err, "unable to release name");
        }
    }
}
