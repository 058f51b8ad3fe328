//! Name reservation registry.

use std::collections::HashMap;
use std::sync::RwLock;

use podlite_shared::errors::{PodliteError, PodliteResult};

/// Registry binding reserved human-readable names to full identifiers.
///
/// Prevents two concurrent operations from creating colliding sandboxes or
/// containers. A name becomes available again once released; reserving the
/// same name for the identifier that already holds it is a no-op.
#[derive(Debug, Default)]
pub struct NameRegistry {
    inner: RwLock<HashMap<String, String>>,
}

impl NameRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name` for `id`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is held by a different identifier.
    pub fn reserve(&self, name: &str, id: &str) -> PodliteResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| PodliteError::Internal(format!("name registry lock poisoned: {e}")))?;

        match inner.get(name) {
            Some(owner) if owner == id => Ok(()),
            Some(owner) => Err(PodliteError::AlreadyExists(format!(
                "name {name} (reserved for {owner})"
            ))),
            None => {
                tracing::trace!(name, id, "reserving name");
                inner.insert(name.to_string(), id.to_string());
                Ok(())
            }
        }
    }

    /// Release `name` for future reuse. Releasing an unknown name is a no-op.
    pub fn release(&self, name: &str) -> PodliteResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| PodliteError::Internal(format!("name registry lock poisoned: {e}")))?;

        if inner.remove(name).is_some() {
            tracing::trace!(name, "released name");
        }
        Ok(())
    }

    /// Identifier currently holding `name`, if any.
    pub fn owner(&self, name: &str) -> PodliteResult<Option<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| PodliteError::Internal(format!("name registry lock poisoned: {e}")))?;

        Ok(inner.get(name).cloned())
    }
}
