//! Network plugin adapter.
//!
//! Abstraction over CNI setup and teardown of a sandbox's network
//! namespace. Plugin internals (CNI configuration, result caching) belong
//! to the implementation behind the trait.

use std::net::IpAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use podlite_shared::errors::PodliteResult;

use crate::sandbox::Sandbox;

/// Identity of a sandbox's network attachment handed to the plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodNetworkSpec {
    /// Pod name.
    pub name: String,

    /// Pod namespace.
    pub namespace: String,

    /// Sandbox identifier.
    pub id: String,

    /// Network namespace path to operate on.
    pub netns_path: String,
}

impl PodNetworkSpec {
    /// Build the attachment spec for a sandbox.
    pub fn for_sandbox(sandbox: &Sandbox) -> Self {
        Self {
            name: sandbox.name().to_string(),
            namespace: sandbox.namespace().to_string(),
            id: sandbox.id().to_string(),
            netns_path: sandbox.netns_path().unwrap_or_default().to_string(),
        }
    }
}

/// The CNI network plugin the lifecycle controller drives.
#[async_trait]
pub trait NetworkPlugin: Send + Sync {
    /// Attach the sandbox namespace to the pod network, returning its IP.
    async fn set_up_pod(&self, pod: &PodNetworkSpec) -> PodliteResult<IpAddr>;

    /// Detach the sandbox namespace from the pod network.
    async fn tear_down_pod(&self, pod: &PodNetworkSpec) -> PodliteResult<()>;

    /// IP currently assigned to the sandbox namespace.
    async fn pod_ip(&self, pod: &PodNetworkSpec) -> PodliteResult<IpAddr>;
}
