//! Storage backend adapter.
//!
//! Abstraction over a content-addressed container/image store. The store
//! owns the on-disk root filesystem and metadata records for sandboxes and
//! containers; the lifecycle controller only sequences its operations.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use podlite_shared::errors::PodliteResult;

/// Record returned when the store creates a sandbox's infra container.
#[derive(Debug, Clone, Default)]
pub struct ContainerInfo {
    /// Identifier of the created record.
    pub id: String,

    /// Run directory allocated for the record. Persisted sandbox and
    /// container files live here.
    pub run_dir: PathBuf,
}

/// Runtime metadata persisted with every storage container record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeContainerMetadata {
    /// True when this record backs a pod sandbox (infra container).
    pub pod: bool,

    /// Identifier of the owning sandbox.
    pub pod_id: String,

    /// Reserved pod name.
    pub pod_name: String,

    /// Reserved container name.
    pub container_name: String,

    /// Image reference backing the record.
    pub image: String,

    /// Log directory configured for the pod.
    pub log_dir: PathBuf,

    /// Attempt counter supplied by the orchestrator.
    pub attempt: u32,

    /// Run directory of the record.
    pub run_dir: PathBuf,

    /// Creation time as a Unix timestamp.
    pub created_at: i64,
}

/// One entry in the store's container listing.
#[derive(Debug, Clone, Default)]
pub struct ContainerListEntry {
    /// Record identifier.
    pub id: String,

    /// Names bound to the record.
    pub names: Vec<String>,
}

/// The storage backend the lifecycle controller drives.
#[async_trait]
pub trait SandboxStore: Send + Sync {
    /// Create the on-disk record and run directory for a sandbox's infra
    /// container.
    async fn create_pod_sandbox(
        &self,
        pod_name: &str,
        pod_id: &str,
        container_name: &str,
        image: &str,
    ) -> PodliteResult<ContainerInfo>;

    /// Read the runtime metadata persisted with a record.
    async fn get_container_metadata(&self, id: &str) -> PodliteResult<RuntimeContainerMetadata>;

    /// Replace the runtime metadata persisted with a record.
    async fn set_container_metadata(
        &self,
        id: &str,
        metadata: &RuntimeContainerMetadata,
    ) -> PodliteResult<()>;

    /// Mount the record's root filesystem, returning the mountpoint.
    async fn start_container(&self, id: &str) -> PodliteResult<PathBuf>;

    /// Unmount the record's root filesystem.
    async fn stop_container(&self, id: &str) -> PodliteResult<()>;

    /// Remove the sandbox record and its run directory.
    async fn remove_pod_sandbox(&self, id: &str) -> PodliteResult<()>;

    /// Delete a container record by name or identifier.
    async fn delete_container(&self, name_or_id: &str) -> PodliteResult<()>;

    /// All container records known to the store.
    async fn containers(&self) -> PodliteResult<Vec<ContainerListEntry>>;
}
