//! Shutdown-marker handling.
//!
//! The marker is a fixed filesystem path whose mere existence, content
//! ignored, means "the previous process shut down uncleanly and all
//! sandboxes must be stopped on next observation". The check runs once
//! after restore at startup and again from the shutdown hook.

use tokio_util::sync::CancellationToken;

use podlite_shared::errors::{PodliteError, PodliteResult};

use super::PodServer;

impl PodServer {
    /// Shutdown hook invoked at process termination.
    pub async fn shutdown(&self) {
        self.cleanup_sandboxes_on_shutdown().await;
    }

    /// Create the shutdown marker, demanding a stop-all on next
    /// observation.
    pub fn arm_shutdown_marker(&self) -> PodliteResult<()> {
        let marker = self.config()?.shutdown_marker();
        std::fs::write(&marker, b"").map_err(|e| {
            PodliteError::Storage(format!(
                "failed to write shutdown marker {}: {e}",
                marker.display()
            ))
        })
    }

    /// Stop every sandbox if the marker exists, then delete the marker.
    pub(crate) async fn cleanup_sandboxes_on_shutdown(&self) {
        let marker = match self.config() {
            Ok(config) => config.shutdown_marker(),
            Err(err) => {
                tracing::warn!(error = %err, "cannot read config for shutdown check");
                return;
            }
        };
        if !marker.exists() {
            return;
        }

        tracing::debug!(marker = %marker.display(), "shutdown marker present, stopping all sandboxes");
        self.stop_all_pod_sandboxes().await;

        if let Err(err) = std::fs::remove_file(&marker) {
            tracing::warn!(marker = %marker.display(), error = %err, "failed to remove shutdown marker");
        }
    }

    /// Stop every registered sandbox, logging failures.
    async fn stop_all_pod_sandboxes(&self) {
        let sandboxes = match self.state.list_sandboxes() {
            Ok(sandboxes) => sandboxes,
            Err(err) => {
                tracing::warn!(error = %err, "cannot list sandboxes for shutdown");
                return;
            }
        };

        // Stops must finish even if the surrounding call was cancelled.
        let token = CancellationToken::new();
        for sandbox in sandboxes {
            if let Err(err) = self.stop_pod_sandbox(sandbox.id(), &token).await {
                tracing::warn!(
                    sandbox_id = %sandbox.id(),
                    error = %err,
                    "failed to stop sandbox at shutdown"
                );
            }
        }
    }
}
