//! Read-only status queries, served from the registries with on-demand
//! runtime status refresh.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use podlite_shared::errors::PodliteResult;

use crate::sandbox::Sandbox;
use crate::sandbox::container::{Container, ContainerState};

use super::PodServer;

/// Readiness of a sandbox as reported to CRI callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodSandboxState {
    /// Sandbox can host containers.
    Ready,

    /// Sandbox is stopped or its infra container is not running.
    NotReady,
}

/// Snapshot of a sandbox returned by status and list queries.
#[derive(Debug, Clone)]
pub struct PodSandboxStatus {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub state: PodSandboxState,
    pub ips: Vec<IpAddr>,
    pub created_at: DateTime<Utc>,
    pub infra_container_id: Option<String>,
}

impl PodServer {
    /// Status of one sandbox.
    ///
    /// Unlike stop, an unknown identifier is an error here: callers asking
    /// for status want the truth, not race tolerance. The infra container
    /// status is refreshed from the runtime before reporting readiness.
    pub async fn pod_sandbox_status(&self, id: &str) -> PodliteResult<PodSandboxStatus> {
        let sandbox = self.sandbox_from_request(id)?;

        if !sandbox.stopped()
            && let Some(infra) = sandbox.infra_container()?
        {
            match self.runtime.update_container_status(&infra).await {
                Ok(state) => infra.set_state(state)?,
                Err(err) => {
                    tracing::warn!(
                        sandbox_id = %sandbox.id(),
                        error = %err,
                        "failed to refresh infra container status"
                    );
                }
            }
        }

        self.sandbox_status(&sandbox)
    }

    /// All registered sandboxes, without refreshing runtime state.
    pub fn list_pod_sandboxes(&self) -> PodliteResult<Vec<PodSandboxStatus>> {
        let mut statuses = Vec::new();
        for sandbox in self.state.list_sandboxes()? {
            statuses.push(self.sandbox_status(&sandbox)?);
        }
        statuses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(statuses)
    }

    /// Status of one workload container, refreshed from the runtime.
    pub async fn container_status(&self, id: &str) -> PodliteResult<ContainerState> {
        let container = self.container_from_request(id)?;
        let state = self.runtime.update_container_status(&container).await?;
        container.set_state(state.clone())?;
        Ok(state)
    }

    /// All registered workload containers.
    pub fn list_containers(&self) -> PodliteResult<Vec<Arc<Container>>> {
        self.state.list_containers()
    }

    fn sandbox_status(&self, sandbox: &Arc<Sandbox>) -> PodliteResult<PodSandboxStatus> {
        let infra = sandbox.infra_container()?;
        let infra_running = match &infra {
            Some(infra) => infra.state()?.status.is_running(),
            None => false,
        };
        let state = if !sandbox.stopped() && infra_running {
            PodSandboxState::Ready
        } else {
            PodSandboxState::NotReady
        };

        Ok(PodSandboxStatus {
            id: sandbox.id().to_string(),
            name: sandbox.name().to_string(),
            namespace: sandbox.namespace().to_string(),
            state,
            ips: sandbox.ips()?,
            created_at: sandbox.created_at(),
            infra_container_id: infra.map(|c| c.id().to_string()),
        })
    }
}
