//! StopPodSandbox: idempotent teardown of a running sandbox.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use podlite_shared::errors::{PodliteError, PodliteResult};

use crate::ids;
use crate::net::PodNetworkSpec;
use crate::sandbox::container::Container;

use super::{CleanupLog, PodServer};

impl PodServer {
    /// Stop a pod sandbox: tear down its network, stop its containers
    /// (workloads first, infra last) and mark it stopped.
    ///
    /// Idempotent: an already-stopped sandbox succeeds immediately, and an
    /// identifier matching nothing also succeeds, tolerating races with a
    /// concurrent remove. Only an empty identifier or an ambiguous prefix
    /// is an error without side effects.
    pub async fn stop_pod_sandbox(&self, id: &str, token: &CancellationToken) -> PodliteResult<()> {
        if id.is_empty() {
            return Err(PodliteError::Validation(
                "sandbox identifier is empty".to_string(),
            ));
        }

        let sandbox = match self.state.sandbox_ids.resolve(id) {
            Ok(full_id) => match self.state.get_sandbox(&full_id)? {
                Some(sandbox) => sandbox,
                None => {
                    tracing::debug!(sandbox_id = %full_id, "sandbox gone, treating stop as success");
                    return Ok(());
                }
            },
            Err(PodliteError::NotFound(_)) => {
                tracing::debug!(sandbox_id = %id, "unknown sandbox, treating stop as success");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if sandbox.stopped() {
            tracing::debug!(sandbox_id = %ids::short(sandbox.id()), "sandbox already stopped");
            return Ok(());
        }

        // Network teardown comes first so network state is never left
        // attached to containers whose processes have already exited. A
        // failure here aborts the whole call with the sandbox unchanged.
        if !sandbox.host_network() {
            self.network
                .tear_down_pod(&PodNetworkSpec::for_sandbox(&sandbox))
                .await?;
        }

        let timeout = self.config()?.stop_timeout;
        let mut cleanup = CleanupLog::new();

        for container in self.state.containers_for_sandbox(sandbox.id())? {
            self.stop_container_process(token, &container, timeout, &mut cleanup)
                .await?;
        }
        if let Some(infra) = sandbox.infra_container()? {
            self.stop_container_process(token, &infra, timeout, &mut cleanup)
                .await?;
        }

        sandbox.set_stopped();
        if !cleanup.is_empty() {
            tracing::debug!(
                sandbox_id = %ids::short(sandbox.id()),
                failures = cleanup.failures().len(),
                "sandbox stopped with cleanup diagnostics"
            );
        }
        tracing::info!(sandbox_id = %ids::short(sandbox.id()), "pod sandbox stopped");
        Ok(())
    }

    /// Stop one container process: signal, bounded wait, storage-level
    /// stop, then a final authoritative status refresh.
    ///
    /// Runtime failures propagate. The storage-level stop and the status
    /// refresh are best effort: the process is already down at that point,
    /// so their failures are recorded as diagnostics and the stop still
    /// counts.
    pub(crate) async fn stop_container_process(
        &self,
        token: &CancellationToken,
        container: &Arc<Container>,
        timeout: i64,
        cleanup: &mut CleanupLog,
    ) -> PodliteResult<()> {
        let state = container.state()?;
        if state.status.is_stopped() {
            return Ok(());
        }

        self.runtime
            .stop_container(token, container, timeout)
            .await?;
        self.runtime
            .wait_container_state_stopped(token, container, timeout)
            .await?;

        if let Err(err) = self.storage.stop_container(container.id()).await {
            cleanup.record("storage_stop_container", container.id(), err);
        }

        // Final action: the in-memory record must reflect the true kernel
        // state before returning, whatever happened above.
        match self.runtime.update_container_status(container).await {
            Ok(new_state) => {
                container.set_state(new_state)?;
                if let Err(err) = container.state_to_disk() {
                    cleanup.record("persist_container_state", container.id(), err);
                }
            }
            Err(err) => cleanup.record("update_container_status", container.id(), err),
        }
        Ok(())
    }
}
