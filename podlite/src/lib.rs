//! Podlite: a node-local CRI sandbox lifecycle shim.
//!
//! Podlite translates CRI lifecycle operations - RunPodSandbox,
//! StopPodSandbox, RemovePodSandbox, status queries, streaming endpoint
//! resolution - into ordered calls against three pluggable backends: a
//! layered storage backend ([`storage::SandboxStore`]), an OCI-compatible
//! runtime ([`oci::OciRuntime`]) and a CNI network plugin
//! ([`net::NetworkPlugin`]).
//!
//! The in-memory registries of sandboxes and containers are kept
//! consistent with persisted records by a startup reconciliation pass, and
//! with kernel state by a background exit monitor reacting to per-process
//! exit notification files.
//!
//! The CRI wire protocol itself is out of scope: the controller exposes a
//! typed Rust API the embedding server maps onto whatever transport it
//! serves.

pub mod cgroup;
pub mod config;
pub mod ids;
pub mod net;
pub mod oci;
pub mod registry;
pub mod sandbox;
pub mod server;
pub mod storage;
pub mod stream;
pub mod util;

pub use podlite_shared::errors::{PodliteError, PodliteResult};

pub use config::{CgroupManager, ShimConfig};
pub use sandbox::container::{Container, ContainerState, ContainerStatus};
pub use sandbox::{Sandbox, SandboxConfig};
pub use server::{
    ConfigWatcher, ContainerServer, ExitMonitor, PodSandboxConfig, PodSandboxMetadata,
    PodSandboxState, PodSandboxStatus, PodServer,
};
