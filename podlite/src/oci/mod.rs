//! OCI runtime adapter.
//!
//! Abstraction over the process supervisor that starts, stops and reports
//! status of OCI containers. The supervisor owns the processes; the
//! lifecycle controller owns the objects and sequences the calls.

mod spec;

pub use spec::SpecGen;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use podlite_shared::errors::PodliteResult;

use crate::sandbox::container::{Container, ContainerState};

/// The OCI-compatible runtime the lifecycle controller drives.
///
/// Calls that can block (`stop_container`, `wait_container_state_stopped`)
/// take the caller's cancellation token and are expected to honor it.
/// Rollback paths pass a fresh token so cleanup always runs to completion.
#[async_trait]
pub trait OciRuntime: Send + Sync {
    /// Start the container process from its prepared bundle.
    async fn start_container(&self, container: &Container) -> PodliteResult<()>;

    /// Signal the container to stop, granting `timeout` seconds of grace
    /// before the runtime escalates.
    async fn stop_container(
        &self,
        token: &CancellationToken,
        container: &Container,
        timeout: i64,
    ) -> PodliteResult<()>;

    /// Block until the runtime reports the container process has exited.
    /// The wait is bounded by what the runtime itself enforces; callers
    /// must tolerate multi-second latency.
    async fn wait_container_state_stopped(
        &self,
        token: &CancellationToken,
        container: &Container,
        timeout: i64,
    ) -> PodliteResult<()>;

    /// Query the authoritative state of the container from the runtime.
    async fn update_container_status(&self, container: &Container)
    -> PodliteResult<ContainerState>;
}
