//! SIGHUP-driven configuration reload.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use podlite_shared::errors::{PodliteError, PodliteResult};

use crate::config::ShimConfig;

use super::PodServer;

/// Handle to the running config watcher task.
pub struct ConfigWatcher {
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ConfigWatcher {
    /// Signal the watcher to stop and wait for the task to finish.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "config watcher task failed");
        }
    }
}

impl PodServer {
    /// Start a watcher that reloads the configuration from `path` on
    /// SIGHUP, replacing it under the process-wide config lock. Reload
    /// failures are logged and the watcher keeps running.
    ///
    /// # Errors
    ///
    /// Errors if `path` does not exist or the signal handler cannot be
    /// registered. Must be called from within the runtime.
    pub fn start_config_watcher(self: &Arc<Self>, path: PathBuf) -> PodliteResult<ConfigWatcher> {
        if !path.exists() {
            return Err(PodliteError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let mut hangup = signal(SignalKind::hangup())
            .map_err(|e| PodliteError::Internal(format!("failed to register SIGHUP handler: {e}")))?;

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let server = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("closing config watcher");
                        return;
                    }
                    received = hangup.recv() => {
                        if received.is_none() {
                            return;
                        }
                        tracing::info!(path = %path.display(), "reloading configuration");
                        match ShimConfig::load(&path) {
                            Err(err) => {
                                tracing::error!(error = %err, "unable to reload configuration");
                            }
                            Ok(new_config) => {
                                if let Err(err) = server.replace_config(new_config) {
                                    tracing::error!(error = %err, "unable to apply reloaded configuration");
                                }
                            }
                        }
                    }
                }
            }
        });

        tracing::debug!("registered SIGHUP config watcher");
        Ok(ConfigWatcher { shutdown, task })
    }
}
