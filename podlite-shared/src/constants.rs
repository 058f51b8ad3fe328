//! Constants shared across the runtime shim.

/// Annotation keys recorded on generated runtime specs.
pub mod annotations {
    /// Annotation recording the cgroup parent of a sandbox's containers.
    pub const CGROUP_PARENT: &str = "io.podlite.cgroup-parent";
}

/// Cgroup manager constants.
pub mod cgroup {
    /// Name selecting the systemd-style cgroup manager.
    pub const SYSTEMD_CGROUP_MANAGER: &str = "systemd";

    /// Name selecting the plain cgroupfs manager.
    pub const CGROUPFS_CGROUP_MANAGER: &str = "cgroupfs";

    /// Scope component used in systemd-style cgroups paths.
    pub const SCOPE_PREFIX: &str = "podlite";

    /// Smallest memory limit a sandbox cgroup may carry (12 MiB).
    pub const MIN_MEMORY_LIMIT: u64 = 12 * 1024 * 1024;

    /// File probed for a configured memory limit under the parent cgroup.
    pub const MEMORY_LIMIT_FILE: &str = "memory.limit_in_bytes";
}

/// File and directory names under run directories and the state root.
pub mod files {
    /// Persisted sandbox or container configuration inside a run directory.
    pub const CONFIG: &str = "config.json";

    /// Persisted container state inside a run directory.
    pub const STATE: &str = "state.json";

    /// Shutdown marker file name under the state root.
    pub const SHUTDOWN_MARKER: &str = "podlite.shutdown";

    /// Directory of exit notification files under the state root.
    pub const EXITS_DIR: &str = "exits";
}

/// Naming conventions for sandboxes and containers.
pub mod naming {
    /// Suffix distinguishing infra container names from pod names.
    pub const INFRA_SUFFIX: &str = "_infra";
}
