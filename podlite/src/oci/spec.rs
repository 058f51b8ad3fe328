//! Minimal generator for OCI runtime specs.

use std::path::PathBuf;

use oci_spec::runtime::Spec;

/// Mutable handle over a runtime spec under construction.
///
/// Only the pieces the shim writes are exposed: annotations and the Linux
/// cgroups path. The full spec is handed to the OCI runtime adapter when
/// the container is created.
#[derive(Debug, Default)]
pub struct SpecGen {
    spec: Spec,
}

impl SpecGen {
    /// Start from an empty runtime spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an annotation on the spec.
    pub fn add_annotation(&mut self, key: &str, value: &str) {
        let mut annotations = self.spec.annotations().clone().unwrap_or_default();
        annotations.insert(key.to_string(), value.to_string());
        self.spec.set_annotations(Some(annotations));
    }

    /// Annotation value, if set.
    pub fn annotation(&self, key: &str) -> Option<String> {
        self.spec
            .annotations()
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .cloned()
    }

    /// Set the Linux cgroups path.
    pub fn set_linux_cgroups_path(&mut self, path: &str) {
        let mut linux = self.spec.linux().clone().unwrap_or_default();
        linux.set_cgroups_path(Some(PathBuf::from(path)));
        self.spec.set_linux(Some(linux));
    }

    /// The Linux cgroups path, if set.
    pub fn linux_cgroups_path(&self) -> Option<PathBuf> {
        self.spec
            .linux()
            .as_ref()
            .and_then(|linux| linux.cgroups_path().clone())
    }

    /// Borrow the spec under construction.
    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    /// Consume the generator, yielding the finished spec.
    pub fn into_spec(self) -> Spec {
        self.spec
    }
}
