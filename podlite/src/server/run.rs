//! RunPodSandbox: sandbox creation with rollback-on-failure.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use podlite_shared::constants::naming;
use podlite_shared::errors::{PodliteError, PodliteResult};

use crate::cgroup::add_cgroup_annotation;
use crate::config::ShimConfig;
use crate::ids;
use crate::net::PodNetworkSpec;
use crate::oci::SpecGen;
use crate::sandbox::container::{Container, ContainerConfig};
use crate::sandbox::{Sandbox, SandboxConfig};
use crate::storage::ContainerInfo;

use super::{CleanupLog, PodServer};

/// Client-supplied description of the sandbox to create.
#[derive(Debug, Clone, Default)]
pub struct PodSandboxConfig {
    /// Pod identity. Required, with non-empty name and namespace.
    pub metadata: Option<PodSandboxMetadata>,

    /// Directory the pod's container logs are written under. Must be an
    /// absolute path.
    pub log_directory: PathBuf,

    /// Requested cgroup parent for the pod's containers.
    pub cgroup_parent: String,

    /// Share the host network namespace (skips network attach).
    pub host_network: bool,

    /// Share the host IPC namespace.
    pub host_ipc: bool,

    /// Orchestrator-supplied labels.
    pub labels: HashMap<String, String>,

    /// Orchestrator-supplied annotations.
    pub annotations: HashMap<String, String>,
}

/// Pod identity within the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct PodSandboxMetadata {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub attempt: u32,
}

/// Everything provisioning needs once validation has passed.
struct ProvisionPlan<'a> {
    request: &'a PodSandboxConfig,
    shim: &'a ShimConfig,
    sandbox_id: &'a str,
    pod_name: &'a str,
    infra_name: &'a str,
    cgroup_parent: &'a str,
    cgroups_path: String,
    info: &'a ContainerInfo,
}

impl PodServer {
    /// Create and start a pod sandbox, returning its identifier.
    ///
    /// Validation failures touch nothing. Once the storage record exists,
    /// any later failure unwinds already-completed steps in reverse order
    /// and always invokes the storage backend's sandbox removal, so no
    /// storage-level sandbox directory is left behind. Rollback ignores
    /// `token`; cleanup failures are logged, never substituted for the
    /// original error.
    pub async fn run_pod_sandbox(
        &self,
        request: &PodSandboxConfig,
        token: &CancellationToken,
    ) -> PodliteResult<String> {
        // Validation: nothing is touched until it passes.
        let metadata = request
            .metadata
            .as_ref()
            .ok_or_else(|| PodliteError::Validation("sandbox config has no metadata".to_string()))?;
        if metadata.name.is_empty() {
            return Err(PodliteError::Validation(
                "sandbox metadata has no name".to_string(),
            ));
        }
        if metadata.namespace.is_empty() {
            return Err(PodliteError::Validation(
                "sandbox metadata has no namespace".to_string(),
            ));
        }
        if !request.log_directory.is_absolute() {
            return Err(PodliteError::Validation(format!(
                "log directory {} must be an absolute path",
                request.log_directory.display()
            )));
        }

        let shim = self.config()?;
        let sandbox_id = ids::generate_id();
        let pod_name = format!(
            "{}_{}_{}_{}",
            metadata.namespace, metadata.name, metadata.uid, metadata.attempt
        );
        let infra_name = format!("{pod_name}{}", naming::INFRA_SUFFIX);

        // Cgroup derivation aborts before any resource exists.
        let mut generator = SpecGen::new();
        let cgroup_parent = add_cgroup_annotation(
            &mut generator,
            &shim.cgroup_mount_dir,
            shim.cgroup_manager.as_str(),
            &request.cgroup_parent,
            &sandbox_id,
        )?;
        let cgroups_path = generator
            .linux_cgroups_path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        self.state.sandbox_names.reserve(&pod_name, &sandbox_id)?;

        // Storage record. From here on the sandbox record is always
        // removed on failure, even when earlier rollback steps fail too.
        let info = match self
            .storage
            .create_pod_sandbox(&pod_name, &sandbox_id, &infra_name, &shim.pause_image)
            .await
        {
            Ok(info) => info,
            Err(err) => {
                if let Err(release_err) = self.state.sandbox_names.release(&pod_name) {
                    tracing::warn!(pod_name = %pod_name, error = %release_err, "failed to release pod name");
                }
                return Err(err);
            }
        };

        let plan = ProvisionPlan {
            request,
            shim: &shim,
            sandbox_id: &sandbox_id,
            pod_name: &pod_name,
            infra_name: &infra_name,
            cgroup_parent: &cgroup_parent,
            cgroups_path,
            info: &info,
        };

        match self.provision_sandbox(&plan, metadata, token).await {
            Ok(()) => {
                tracing::info!(
                    sandbox_id = %ids::short(&sandbox_id),
                    pod_name = %pod_name,
                    "pod sandbox running"
                );
                Ok(sandbox_id)
            }
            Err(err) => {
                let mut cleanup = CleanupLog::new();
                self.rollback_sandbox(&sandbox_id, &pod_name, &infra_name, &mut cleanup)
                    .await;
                // Always attempted, regardless of how far provisioning got.
                if let Err(remove_err) = self.storage.remove_pod_sandbox(&sandbox_id).await {
                    cleanup.record("storage_remove_pod_sandbox", &sandbox_id, remove_err);
                }
                Err(err)
            }
        }
    }

    /// Provision the sandbox after its storage record exists. Failures
    /// here trigger the caller's rollback.
    async fn provision_sandbox(
        &self,
        plan: &ProvisionPlan<'_>,
        metadata: &PodSandboxMetadata,
        token: &CancellationToken,
    ) -> PodliteResult<()> {
        let mut record = self.storage.get_container_metadata(plan.sandbox_id).await?;
        record.pod = true;
        record.pod_id = plan.sandbox_id.to_string();
        record.pod_name = plan.pod_name.to_string();
        record.container_name = plan.infra_name.to_string();
        record.image = plan.shim.pause_image.clone();
        record.log_dir = plan.request.log_directory.clone();
        record.attempt = metadata.attempt;
        record.run_dir = plan.info.run_dir.clone();
        record.created_at = Utc::now().timestamp();
        self.storage
            .set_container_metadata(plan.sandbox_id, &record)
            .await?;

        // Register provisional objects before kernel resources exist, so
        // partial failures have an addressable object to unwind.
        let netns_path = if plan.request.host_network {
            None
        } else {
            Some(plan.info.run_dir.join("netns").display().to_string())
        };
        let created_at = Utc::now();
        let sandbox_config = SandboxConfig {
            id: plan.sandbox_id.to_string(),
            name: plan.pod_name.to_string(),
            namespace: metadata.namespace.clone(),
            uid: metadata.uid.clone(),
            attempt: metadata.attempt,
            log_dir: plan.request.log_directory.clone(),
            cgroup_parent: plan.cgroup_parent.to_string(),
            host_network: plan.request.host_network,
            host_ipc: plan.request.host_ipc,
            netns_path,
            run_dir: plan.info.run_dir.clone(),
            image: plan.shim.pause_image.clone(),
            created_at,
        };
        let infra = Arc::new(Container::new(ContainerConfig {
            id: plan.sandbox_id.to_string(),
            name: plan.infra_name.to_string(),
            sandbox_id: plan.sandbox_id.to_string(),
            image: plan.shim.pause_image.clone(),
            run_dir: plan.info.run_dir.clone(),
            log_path: Some(
                plan.request
                    .log_directory
                    .join(format!("{}.log", plan.sandbox_id)),
            ),
            cgroup_path: plan.cgroups_path.clone(),
            infra: true,
            created_at,
        }));
        let sandbox = Arc::new(Sandbox::new(sandbox_config.clone()));

        self.state
            .container_names
            .reserve(plan.infra_name, plan.sandbox_id)?;
        self.state.sandbox_ids.reserve(plan.sandbox_id)?;
        self.state.container_ids.reserve(plan.sandbox_id)?;
        sandbox.set_infra(Arc::clone(&infra))?;
        self.state.add_sandbox(Arc::clone(&sandbox))?;

        // Persisted so the sandbox survives a shim restart.
        sandbox_config.to_disk()?;
        infra.state_to_disk()?;

        let mountpoint = self.storage.start_container(plan.sandbox_id).await?;
        tracing::debug!(
            sandbox_id = %ids::short(plan.sandbox_id),
            mountpoint = %mountpoint.display(),
            "mounted sandbox rootfs"
        );

        if !plan.request.host_network {
            let ip = self
                .network
                .set_up_pod(&PodNetworkSpec::for_sandbox(&sandbox))
                .await?;
            sandbox.add_ip(ip)?;
        }

        if token.is_cancelled() {
            return Err(PodliteError::Runtime(
                "run_pod_sandbox cancelled before infra container start".to_string(),
            ));
        }

        self.runtime.start_container(&infra).await?;
        let mut state = infra.state()?;
        state.mark_running();
        infra.set_state(state)?;
        if let Err(err) = infra.state_to_disk() {
            tracing::warn!(
                sandbox_id = %ids::short(plan.sandbox_id),
                error = %err,
                "unable to write infra container state to disk"
            );
        }
        Ok(())
    }

    /// Unwind a partially provisioned sandbox in reverse order. Runs to
    /// completion regardless of cancellation; failures are recorded as
    /// diagnostics only.
    async fn rollback_sandbox(
        &self,
        sandbox_id: &str,
        pod_name: &str,
        infra_name: &str,
        cleanup: &mut CleanupLog,
    ) {
        match self.state.get_sandbox(sandbox_id) {
            Ok(Some(sandbox)) => {
                let attached = !sandbox.host_network()
                    && !sandbox.ips().unwrap_or_default().is_empty();
                if attached
                    && let Err(err) = self
                        .network
                        .tear_down_pod(&PodNetworkSpec::for_sandbox(&sandbox))
                        .await
                {
                    cleanup.record("network_tear_down_pod", sandbox_id, err);
                }
                if let Err(err) = self.state.remove_sandbox(sandbox_id) {
                    cleanup.record("remove_sandbox", sandbox_id, err);
                }
            }
            Ok(None) => {}
            Err(err) => cleanup.record("get_sandbox", sandbox_id, err),
        }

        if let Err(err) = self.state.container_ids.release(sandbox_id) {
            cleanup.record("release_container_id", sandbox_id, err);
        }
        if let Err(err) = self.state.sandbox_ids.release(sandbox_id) {
            cleanup.record("release_sandbox_id", sandbox_id, err);
        }
        if let Err(err) = self.state.container_names.release(infra_name) {
            cleanup.record("release_container_name", infra_name, err);
        }
        if let Err(err) = self.state.sandbox_names.release(pod_name) {
            cleanup.record("release_pod_name", pod_name, err);
        }
    }
}
