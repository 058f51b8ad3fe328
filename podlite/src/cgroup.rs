//! Cgroup path derivation and annotation.
//!
//! The derived path must agree exactly with what the configured cgroup
//! manager will do with it, so the rules differ per manager: systemd wants
//! slice names it can expand, cgroupfs wants plain path components.

use std::path::Path;

use podlite_shared::constants::{annotations, cgroup};
use podlite_shared::errors::{PodliteError, PodliteResult};

use crate::oci::SpecGen;

const SLICE_SUFFIX: &str = ".slice";

/// Derive the cgroup path for a sandbox's containers and record it on the
/// runtime spec under construction.
///
/// - systemd manager: `cgroup_parent` must name a slice (`*.slice`). The
///   slice is validated by expansion, and when a memory limit is configured
///   under `parent_cgroup_dir` it must be at least 12 MiB. The spec's
///   cgroups path becomes `<slice>:podlite:<container_id>`.
/// - any other manager: slice-style names are rejected and the spec's
///   cgroups path becomes `<parent>/<container_id>`.
///
/// An empty `cgroup_parent` derives nothing and returns an empty path. On
/// success the parent is recorded as an annotation and returned.
pub fn add_cgroup_annotation(
    generator: &mut SpecGen,
    parent_cgroup_dir: &Path,
    cgroup_manager: &str,
    cgroup_parent: &str,
    container_id: &str,
) -> PodliteResult<String> {
    if cgroup_parent.is_empty() {
        return Ok(String::new());
    }

    if cgroup_manager == cgroup::SYSTEMD_CGROUP_MANAGER {
        if !cgroup_parent.ends_with(SLICE_SUFFIX) {
            return Err(PodliteError::Validation(format!(
                "systemd cgroup manager did not receive a slice as parent: {cgroup_parent}"
            )));
        }
        expand_slice(cgroup_parent)?;
        check_memory_limit(parent_cgroup_dir, cgroup_parent)?;
        generator.set_linux_cgroups_path(&format!(
            "{cgroup_parent}:{}:{container_id}",
            cgroup::SCOPE_PREFIX
        ));
    } else {
        if cgroup_parent.ends_with(SLICE_SUFFIX) {
            return Err(PodliteError::Validation(format!(
                "cgroup manager {cgroup_manager} cannot use systemd slice {cgroup_parent} as parent"
            )));
        }
        generator.set_linux_cgroups_path(&format!("{cgroup_parent}/{container_id}"));
    }

    generator.add_annotation(annotations::CGROUP_PARENT, cgroup_parent);
    Ok(cgroup_parent.to_string())
}

/// Expand a systemd slice name into its full cgroupfs path, mirroring
/// systemd's slice-expansion algorithm: `pod-burstable.slice` becomes
/// `/pod.slice/pod-burstable.slice`.
///
/// Doubled separators and embedded path separators are invalid.
pub fn expand_slice(slice: &str) -> PodliteResult<String> {
    let Some(name) = slice.strip_suffix(SLICE_SUFFIX) else {
        return Err(PodliteError::Validation(format!(
            "{slice} is not a systemd slice name"
        )));
    };

    // "-.slice" names the root of the slice hierarchy.
    if name == "-" {
        return Ok("/".to_string());
    }
    if name.is_empty() || name.contains('/') {
        return Err(PodliteError::Validation(format!(
            "invalid slice name {slice}"
        )));
    }

    let mut path = String::new();
    let mut prefix = String::new();
    for component in name.split('-') {
        // A doubled dash yields an empty component.
        if component.is_empty() {
            return Err(PodliteError::Validation(format!(
                "invalid slice name {slice}"
            )));
        }
        path.push('/');
        path.push_str(&prefix);
        path.push_str(component);
        path.push_str(SLICE_SUFFIX);
        prefix.push_str(component);
        prefix.push('-');
    }
    Ok(path)
}

/// Enforce the minimum memory limit configured for the parent cgroup.
///
/// An absent limit file means no limit is set. An empty value is accepted;
/// anything else must parse as an integer of at least 12 MiB.
fn check_memory_limit(parent_cgroup_dir: &Path, cgroup_parent: &str) -> PodliteResult<()> {
    let path = parent_cgroup_dir
        .join(cgroup_parent)
        .join(cgroup::MEMORY_LIMIT_FILE);

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(PodliteError::Config(format!(
                "cannot read memory limit {}: {err}",
                path.display()
            )));
        }
    };

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let limit: u64 = trimmed.parse().map_err(|_| {
        PodliteError::Config(format!(
            "invalid memory limit {trimmed:?} in {}",
            path.display()
        ))
    })?;
    if limit < cgroup::MIN_MEMORY_LIMIT {
        return Err(PodliteError::Config(format!(
            "memory limit {limit} is below the {} byte minimum",
            cgroup::MIN_MEMORY_LIMIT
        )));
    }
    Ok(())
}
