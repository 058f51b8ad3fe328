//! Error types for the Podlite runtime shim.

use thiserror::Error;

/// Result alias used throughout the Podlite crates.
pub type PodliteResult<T> = Result<T, PodliteError>;

/// Errors surfaced by the runtime shim.
///
/// The variants mirror the failure taxonomy of the lifecycle engine:
/// `Validation` errors are rejected before any side effect, adapter errors
/// (`Storage`, `Runtime`, `Network`) may trigger rollback, and `Internal`
/// covers invariant breaches such as poisoned locks.
#[derive(Debug, Error)]
pub enum PodliteError {
    /// Malformed request, rejected before any resource is touched.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// OCI runtime failure.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Network plugin failure.
    #[error("network error: {0}")]
    Network(String),

    /// Requested entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Entity or reservation already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Operation is not valid in the entity's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration is missing or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// Invariant breach or unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}
