//! RemovePodSandbox: release all resources of a stopped sandbox.

use tokio_util::sync::CancellationToken;

use podlite_shared::errors::{PodliteError, PodliteResult};

use crate::ids;

use super::{CleanupLog, PodServer};

impl PodServer {
    /// Remove a stopped pod sandbox: delete its storage records, release
    /// every name reservation and drop the registry entries.
    ///
    /// Only valid once the sandbox is stopped. Removing an unknown
    /// identifier succeeds (idempotent). The in-memory entries are dropped
    /// last, after the storage resources are confirmed released.
    pub async fn remove_pod_sandbox(
        &self,
        id: &str,
        _token: &CancellationToken,
    ) -> PodliteResult<()> {
        if id.is_empty() {
            return Err(PodliteError::Validation(
                "sandbox identifier is empty".to_string(),
            ));
        }

        let sandbox = match self.state.sandbox_ids.resolve(id) {
            Ok(full_id) => match self.state.get_sandbox(&full_id)? {
                Some(sandbox) => sandbox,
                None => return Ok(()),
            },
            Err(PodliteError::NotFound(_)) => {
                tracing::debug!(sandbox_id = %id, "unknown sandbox, treating remove as success");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if !sandbox.stopped() {
            return Err(PodliteError::InvalidState(format!(
                "sandbox {} is not stopped",
                sandbox.id()
            )));
        }

        let mut cleanup = CleanupLog::new();

        // Workload containers first: their records must be gone before the
        // sandbox record itself is removed.
        for container in self.state.containers_for_sandbox(sandbox.id())? {
            if let Err(err) = self.storage.delete_container(container.id()).await {
                cleanup.record("storage_delete_container", container.id(), err);
            }
            self.state.remove_container(container.id())?;
            self.state.container_names.release(container.name())?;
            self.state.container_ids.release(container.id())?;
        }

        if let Some(infra) = sandbox.infra_container()? {
            self.state.container_names.release(infra.name())?;
        }
        self.state.container_ids.release(sandbox.id())?;

        // The sandbox record removal is the one fatal step here: a sandbox
        // must never disappear from memory while its storage lingers.
        self.storage.remove_pod_sandbox(sandbox.id()).await?;

        self.state.remove_sandbox(sandbox.id())?;
        self.state.sandbox_names.release(sandbox.name())?;
        self.state.sandbox_ids.release(sandbox.id())?;

        if !cleanup.is_empty() {
            tracing::debug!(
                sandbox_id = %ids::short(sandbox.id()),
                failures = cleanup.failures().len(),
                "sandbox removed with cleanup diagnostics"
            );
        }
        tracing::info!(sandbox_id = %ids::short(sandbox.id()), "pod sandbox removed");
        Ok(())
    }
}
