//! Background watcher reacting to container exit notifications.
//!
//! The process supervisor drops one file per exited process into the exits
//! directory, named by container identifier. Watching that directory is
//! the primary mechanism keeping in-memory container state converged with
//! actual process exits without polling every container on every query.

use std::path::PathBuf;
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use podlite_shared::errors::PodliteResult;

use super::PodServer;

/// Handle to the running exit monitor task.
///
/// Dropping the handle does not stop the task; call [`ExitMonitor::stop`]
/// so shutdown can observe the task finishing.
pub struct ExitMonitor {
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ExitMonitor {
    /// Signal the monitor to stop and wait for the task to finish.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "exit monitor task failed");
        }
    }
}

impl PodServer {
    /// Start the exit monitor over the configured exits directory.
    ///
    /// Watch-setup failures are fatal to the monitor task only, never to
    /// the process: the task logs and exits, and the next status query
    /// still re-syncs on demand.
    pub fn start_exit_monitor(self: &Arc<Self>) -> PodliteResult<ExitMonitor> {
        let exits_dir = self.config()?.exits_dir();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let server = Arc::clone(self);
        let task = tokio::spawn(async move {
            server.run_exit_monitor(exits_dir, token).await;
        });
        Ok(ExitMonitor { shutdown, task })
    }

    async fn run_exit_monitor(self: Arc<Self>, exits_dir: PathBuf, shutdown: CancellationToken) {
        // Bounded channel bridging the platform watcher thread into this
        // task. The watcher callback blocks when the task falls behind.
        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(64);
        let mut watcher = match notify::recommended_watcher(move |result| {
            let _ = tx.blocking_send(result);
        }) {
            Ok(watcher) => watcher,
            Err(err) => {
                tracing::error!(error = %err, "failed to create exit watcher");
                return;
            }
        };
        if let Err(err) = watcher.watch(&exits_dir, RecursiveMode::NonRecursive) {
            tracing::error!(
                path = %exits_dir.display(),
                error = %err,
                "failed to watch exits directory"
            );
            return;
        }
        tracing::debug!(path = %exits_dir.display(), "exit monitor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("closing exit monitor");
                    return;
                }
                received = rx.recv() => match received {
                    None => {
                        tracing::error!("exit watcher channel closed");
                        return;
                    }
                    Some(Err(err)) => {
                        // Fatal to the monitor, not to the process.
                        tracing::error!(error = %err, "exit watcher error");
                        return;
                    }
                    Some(Ok(event)) => {
                        if !matches!(event.kind, EventKind::Create(_)) {
                            continue;
                        }
                        for path in &event.paths {
                            let Some(container_id) = path.file_name().and_then(|n| n.to_str())
                            else {
                                continue;
                            };
                            self.handle_container_exit(container_id).await;
                        }
                    }
                }
            }
        }
    }

    /// React to one exit notification: refresh and persist the state of
    /// the matching container.
    ///
    /// Workload containers are checked first, then sandboxes' infra
    /// containers. Identifiers matching neither are ignored. Failures are
    /// logged, not retried: the next status query naturally re-syncs.
    pub(crate) async fn handle_container_exit(&self, container_id: &str) {
        tracing::debug!(container_id, "container or sandbox exited");

        let container = match self.state.get_container(container_id) {
            Ok(Some(container)) => Some(container),
            Ok(None) => match self.state.get_sandbox(container_id) {
                Ok(Some(sandbox)) => match sandbox.infra_container() {
                    Ok(Some(infra)) => Some(infra),
                    Ok(None) => {
                        tracing::warn!(
                            sandbox_id = container_id,
                            "no infra container set for sandbox"
                        );
                        None
                    }
                    Err(err) => {
                        tracing::warn!(sandbox_id = container_id, error = %err, "infra lookup failed");
                        None
                    }
                },
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(container_id, error = %err, "sandbox lookup failed");
                    None
                }
            },
            Err(err) => {
                tracing::warn!(container_id, error = %err, "container lookup failed");
                None
            }
        };
        let Some(container) = container else {
            return;
        };

        match self.runtime.update_container_status(&container).await {
            Err(err) => {
                tracing::warn!(container_id, error = %err, "failed to update container status");
            }
            Ok(state) => {
                if let Err(err) = container.set_state(state) {
                    tracing::warn!(container_id, error = %err, "failed to store container status");
                    return;
                }
                if let Err(err) = container.state_to_disk() {
                    tracing::warn!(
                        container_id,
                        error = %err,
                        "unable to write container state to disk"
                    );
                }
            }
        }
    }
}
