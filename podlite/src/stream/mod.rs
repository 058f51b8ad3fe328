//! Streaming endpoints: exec, attach and port-forward resolution.
//!
//! The streaming subsystem carries no lifecycle logic. It resolves
//! requests against the lifecycle controller and hands back endpoint URLs
//! served by the embedding process; the actual byte streaming and TLS
//! termination belong to that process.

pub mod tls;

use std::sync::Arc;

use podlite_shared::errors::{PodliteError, PodliteResult};

use crate::server::PodServer;

/// Exec request against a running container.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub container_id: String,
    pub cmd: Vec<String>,
    pub tty: bool,
    pub stdin: bool,
}

/// Attach request against a running container.
#[derive(Debug, Clone, Default)]
pub struct AttachRequest {
    pub container_id: String,
    pub tty: bool,
    pub stdin: bool,
}

/// Port-forward request against a sandbox.
#[derive(Debug, Clone, Default)]
pub struct PortForwardRequest {
    pub sandbox_id: String,
    pub ports: Vec<i32>,
}

/// Resolved streaming endpoint.
#[derive(Debug, Clone)]
pub struct StreamEndpoint {
    pub url: String,
}

/// Resolver for streaming requests.
///
/// Holds an owned reference to the lifecycle controller and forwards all
/// lookups to it.
pub struct StreamService {
    server: Arc<PodServer>,
}

impl StreamService {
    pub fn new(server: Arc<PodServer>) -> Self {
        Self { server }
    }

    /// Resolve an exec request to its endpoint.
    pub fn get_exec(&self, request: &ExecRequest) -> PodliteResult<StreamEndpoint> {
        if request.cmd.is_empty() {
            return Err(PodliteError::Validation(
                "exec request has no command".to_string(),
            ));
        }
        let container = self.server.container_from_request(&request.container_id)?;
        Ok(StreamEndpoint {
            url: format!("{}/exec/{}", self.base_url()?, container.id()),
        })
    }

    /// Resolve an attach request to its endpoint.
    pub fn get_attach(&self, request: &AttachRequest) -> PodliteResult<StreamEndpoint> {
        let container = self.server.container_from_request(&request.container_id)?;
        Ok(StreamEndpoint {
            url: format!("{}/attach/{}", self.base_url()?, container.id()),
        })
    }

    /// Resolve a port-forward request to its endpoint.
    pub fn get_port_forward(&self, request: &PortForwardRequest) -> PodliteResult<StreamEndpoint> {
        let sandbox = self.server.sandbox_from_request(&request.sandbox_id)?;
        Ok(StreamEndpoint {
            url: format!("{}/portforward/{}", self.base_url()?, sandbox.id()),
        })
    }

    fn base_url(&self) -> PodliteResult<String> {
        let config = self.server.config()?;
        let scheme = if config.stream_tls.is_some() {
            "https"
        } else {
            "http"
        };
        Ok(format!("{scheme}://{}", config.stream_address))
    }
}
