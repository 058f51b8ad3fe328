//! Shared fixtures: mock backends recording a cross-adapter call log.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use podlite::config::ShimConfig;
use podlite::net::{NetworkPlugin, PodNetworkSpec};
use podlite::oci::OciRuntime;
use podlite::sandbox::SandboxConfig;
use podlite::sandbox::container::{Container, ContainerConfig, ContainerState};
use podlite::server::{PodSandboxConfig, PodSandboxMetadata, PodServer};
use podlite::storage::{
    ContainerInfo, ContainerListEntry, RuntimeContainerMetadata, SandboxStore,
};
use podlite::{PodliteError, PodliteResult};

pub const TEST_IP: &str = "10.1.2.3";

/// Ordered log of adapter calls shared by every mock.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn record(&self, event: &str) {
        self.0.lock().unwrap().push(event.to_string());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    /// Events starting with `prefix`, in order.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.snapshot().iter().any(|e| e == event)
    }
}

/// Operations armed to fail with an injected error.
#[derive(Default)]
pub struct FailSet(Mutex<HashSet<String>>);

impl FailSet {
    pub fn arm(&self, op: &str) {
        self.0.lock().unwrap().insert(op.to_string());
    }

    pub fn disarm(&self, op: &str) {
        self.0.lock().unwrap().remove(op);
    }

    fn check(&self, op: &str, make: impl FnOnce(String) -> PodliteError) -> PodliteResult<()> {
        if self.0.lock().unwrap().contains(op) {
            return Err(make(format!("{op} failed (injected)")));
        }
        Ok(())
    }
}

// ============================================================================
// MOCK STORAGE
// ============================================================================

pub struct MockStorage {
    pub log: EventLog,
    pub fail: FailSet,
    root: PathBuf,
    pub metadata: Mutex<HashMap<String, RuntimeContainerMetadata>>,
    pub entries: Mutex<Vec<ContainerListEntry>>,
    pub deleted: Mutex<Vec<String>>,
}

impl MockStorage {
    pub fn new(log: EventLog, root: PathBuf) -> Self {
        std::fs::create_dir_all(&root).unwrap();
        Self {
            log,
            fail: FailSet::default(),
            root,
            metadata: Mutex::new(HashMap::new()),
            entries: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Run directory the mock assigns to a record.
    pub fn run_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Pre-seed one listed record with its metadata (for restore tests).
    pub fn seed_record(&self, id: &str, names: &[&str], metadata: RuntimeContainerMetadata) {
        self.entries.lock().unwrap().push(ContainerListEntry {
            id: id.to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
        });
        self.metadata
            .lock()
            .unwrap()
            .insert(id.to_string(), metadata);
    }

    /// Pre-seed one listed record without metadata (reads will fail).
    pub fn seed_orphan_entry(&self, id: &str, names: &[&str]) {
        self.entries.lock().unwrap().push(ContainerListEntry {
            id: id.to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
        });
    }
}

#[async_trait]
impl SandboxStore for MockStorage {
    async fn create_pod_sandbox(
        &self,
        _pod_name: &str,
        pod_id: &str,
        container_name: &str,
        image: &str,
    ) -> PodliteResult<ContainerInfo> {
        self.log.record("storage.create_pod_sandbox");
        self.fail.check("create_pod_sandbox", PodliteError::Storage)?;

        let run_dir = self.run_dir(pod_id);
        std::fs::create_dir_all(&run_dir).unwrap();
        self.metadata.lock().unwrap().insert(
            pod_id.to_string(),
            RuntimeContainerMetadata {
                container_name: container_name.to_string(),
                image: image.to_string(),
                run_dir: run_dir.clone(),
                ..Default::default()
            },
        );
        Ok(ContainerInfo {
            id: pod_id.to_string(),
            run_dir,
        })
    }

    async fn get_container_metadata(&self, id: &str) -> PodliteResult<RuntimeContainerMetadata> {
        self.log.record("storage.get_container_metadata");
        self.fail
            .check("get_container_metadata", PodliteError::Storage)?;
        self.metadata
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| PodliteError::NotFound(format!("metadata for {id}")))
    }

    async fn set_container_metadata(
        &self,
        id: &str,
        metadata: &RuntimeContainerMetadata,
    ) -> PodliteResult<()> {
        self.log.record("storage.set_container_metadata");
        self.fail
            .check("set_container_metadata", PodliteError::Storage)?;
        self.metadata
            .lock()
            .unwrap()
            .insert(id.to_string(), metadata.clone());
        Ok(())
    }

    async fn start_container(&self, id: &str) -> PodliteResult<PathBuf> {
        self.log.record("storage.start_container");
        self.fail.check("start_container", PodliteError::Storage)?;
        Ok(self.run_dir(id).join("rootfs"))
    }

    async fn stop_container(&self, _id: &str) -> PodliteResult<()> {
        self.log.record("storage.stop_container");
        self.fail.check("stop_container", PodliteError::Storage)?;
        Ok(())
    }

    async fn remove_pod_sandbox(&self, id: &str) -> PodliteResult<()> {
        self.log.record("storage.remove_pod_sandbox");
        self.fail
            .check("remove_pod_sandbox", PodliteError::Storage)?;
        self.metadata.lock().unwrap().remove(id);
        Ok(())
    }

    async fn delete_container(&self, name_or_id: &str) -> PodliteResult<()> {
        self.log.record("storage.delete_container");
        self.fail.check("delete_container", PodliteError::Storage)?;
        self.deleted.lock().unwrap().push(name_or_id.to_string());
        Ok(())
    }

    async fn containers(&self) -> PodliteResult<Vec<ContainerListEntry>> {
        self.log.record("storage.containers");
        self.fail.check("containers", PodliteError::Storage)?;
        Ok(self.entries.lock().unwrap().clone())
    }
}

// ============================================================================
// MOCK OCI RUNTIME
// ============================================================================

pub struct MockRuntime {
    pub log: EventLog,
    pub fail: FailSet,
    /// State handed back by `update_container_status`.
    pub refreshed_state: Mutex<ContainerState>,
}

impl MockRuntime {
    pub fn new(log: EventLog) -> Self {
        let mut state = ContainerState::new();
        state.mark_stopped(Some(0));
        Self {
            log,
            fail: FailSet::default(),
            refreshed_state: Mutex::new(state),
        }
    }

    pub fn set_refreshed_state(&self, state: ContainerState) {
        *self.refreshed_state.lock().unwrap() = state;
    }
}

#[async_trait]
impl OciRuntime for MockRuntime {
    async fn start_container(&self, _container: &Container) -> PodliteResult<()> {
        self.log.record("runtime.start_container");
        self.fail.check("start_container", PodliteError::Runtime)
    }

    async fn stop_container(
        &self,
        _token: &CancellationToken,
        _container: &Container,
        _timeout: i64,
    ) -> PodliteResult<()> {
        self.log.record("runtime.stop_container");
        self.fail.check("stop_container", PodliteError::Runtime)
    }

    async fn wait_container_state_stopped(
        &self,
        _token: &CancellationToken,
        _container: &Container,
        _timeout: i64,
    ) -> PodliteResult<()> {
        self.log.record("runtime.wait_container_state_stopped");
        self.fail
            .check("wait_container_state_stopped", PodliteError::Runtime)
    }

    async fn update_container_status(
        &self,
        _container: &Container,
    ) -> PodliteResult<ContainerState> {
        self.log.record("runtime.update_container_status");
        self.fail
            .check("update_container_status", PodliteError::Runtime)?;
        Ok(self.refreshed_state.lock().unwrap().clone())
    }
}

// ============================================================================
// MOCK NETWORK PLUGIN
// ============================================================================

pub struct MockNetwork {
    pub log: EventLog,
    pub fail: FailSet,
}

impl MockNetwork {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail: FailSet::default(),
        }
    }
}

#[async_trait]
impl NetworkPlugin for MockNetwork {
    async fn set_up_pod(&self, _pod: &PodNetworkSpec) -> PodliteResult<IpAddr> {
        self.log.record("network.set_up_pod");
        self.fail.check("set_up_pod", PodliteError::Network)?;
        Ok(TEST_IP.parse().unwrap())
    }

    async fn tear_down_pod(&self, _pod: &PodNetworkSpec) -> PodliteResult<()> {
        self.log.record("network.tear_down_pod");
        self.fail.check("tear_down_pod", PodliteError::Network)
    }

    async fn pod_ip(&self, _pod: &PodNetworkSpec) -> PodliteResult<IpAddr> {
        self.log.record("network.pod_ip");
        self.fail.check("pod_ip", PodliteError::Network)?;
        Ok(TEST_IP.parse().unwrap())
    }
}

// ============================================================================
// TEST CONTEXT
// ============================================================================

/// Isolated lifecycle controller over the three mocks, with automatic
/// cleanup of its state root.
pub struct TestContext {
    pub server: Arc<PodServer>,
    pub storage: Arc<MockStorage>,
    pub runtime: Arc<MockRuntime>,
    pub network: Arc<MockNetwork>,
    pub log: EventLog,
    pub root: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_setup(|_, _, _, _| {}).await
    }

    /// Build a context, letting `seed` prepare mocks and the state root
    /// before the server construction (and thus before restore) runs.
    pub async fn with_setup(
        seed: impl FnOnce(&MockStorage, &MockRuntime, &MockNetwork, &Path),
    ) -> Self {
        let root = TempDir::new().expect("failed to create temp dir");
        let state_root = root.path().join("state");
        std::fs::create_dir_all(&state_root).unwrap();

        let log = EventLog::default();
        let storage = Arc::new(MockStorage::new(log.clone(), root.path().join("storage")));
        let runtime = Arc::new(MockRuntime::new(log.clone()));
        let network = Arc::new(MockNetwork::new(log.clone()));
        seed(&storage, &runtime, &network, &state_root);

        let config = ShimConfig {
            root_dir: state_root,
            ..Default::default()
        };
        let server = PodServer::new(
            config,
            Arc::clone(&storage) as Arc<dyn SandboxStore>,
            Arc::clone(&runtime) as Arc<dyn OciRuntime>,
            Arc::clone(&network) as Arc<dyn NetworkPlugin>,
        )
        .await
        .expect("failed to create server");

        log.clear();
        Self {
            server,
            storage,
            runtime,
            network,
            log,
            root,
        }
    }
}

/// A valid sandbox request for `name` in `namespace`.
pub fn pod_config(name: &str, namespace: &str, host_network: bool) -> PodSandboxConfig {
    PodSandboxConfig {
        metadata: Some(PodSandboxMetadata {
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: "uid1".to_string(),
            attempt: 0,
        }),
        log_directory: PathBuf::from("/tmp"),
        host_network,
        ..Default::default()
    }
}

pub fn token() -> CancellationToken {
    CancellationToken::new()
}

/// A running container state reported by the mock runtime.
pub fn running_state() -> ContainerState {
    let mut state = ContainerState::new();
    state.mark_running();
    state
}

/// A stopped container state with the given exit code.
pub fn stopped_state(exit_code: i32) -> ContainerState {
    let mut state = ContainerState::new();
    state.mark_stopped(Some(exit_code));
    state
}

/// Seed one pod record; when `write_files` is set, the persisted sandbox
/// config and infra state are written so the pod can be restored.
pub fn seed_pod(storage: &MockStorage, id: &str, pod_name: &str, write_files: bool, running: bool) {
    let run_dir = storage.run_dir(id);
    let infra_name = format!("{pod_name}_infra");
    storage.seed_record(
        id,
        &[pod_name, infra_name.as_str()],
        RuntimeContainerMetadata {
            pod: true,
            pod_id: id.to_string(),
            pod_name: pod_name.to_string(),
            container_name: infra_name.clone(),
            image: "registry.k8s.io/pause:3.9".to_string(),
            log_dir: PathBuf::from("/tmp"),
            attempt: 0,
            run_dir: run_dir.clone(),
            created_at: 0,
        },
    );

    if !write_files {
        return;
    }
    std::fs::create_dir_all(&run_dir).unwrap();
    let config = SandboxConfig {
        id: id.to_string(),
        name: pod_name.to_string(),
        namespace: "default".to_string(),
        uid: "uid1".to_string(),
        attempt: 0,
        log_dir: PathBuf::from("/tmp"),
        cgroup_parent: String::new(),
        host_network: false,
        host_ipc: false,
        netns_path: Some(run_dir.join("netns").display().to_string()),
        run_dir: run_dir.clone(),
        image: "registry.k8s.io/pause:3.9".to_string(),
        created_at: Utc::now(),
    };
    config.to_disk().unwrap();

    let mut state = ContainerState::new();
    if running {
        state.mark_running();
        state.pid = Some(std::process::id());
    } else {
        state.mark_stopped(Some(0));
    }
    let infra = Container::with_state(
        ContainerConfig {
            id: id.to_string(),
            name: infra_name,
            sandbox_id: id.to_string(),
            image: "registry.k8s.io/pause:3.9".to_string(),
            run_dir,
            log_path: None,
            cgroup_path: String::new(),
            infra: true,
            created_at: Utc::now(),
        },
        state,
    );
    infra.state_to_disk().unwrap();
}

/// Seed one workload container record under `pod_id`; when `write_files`
/// is set, the persisted config and state are written so it can be
/// restored.
pub fn seed_workload(
    storage: &MockStorage,
    id: &str,
    name: &str,
    pod_id: &str,
    write_files: bool,
) {
    let run_dir = storage.run_dir(id);
    storage.seed_record(
        id,
        &[name],
        RuntimeContainerMetadata {
            pod: false,
            pod_id: pod_id.to_string(),
            pod_name: String::new(),
            container_name: name.to_string(),
            image: "docker.io/library/busybox:latest".to_string(),
            log_dir: PathBuf::from("/tmp"),
            attempt: 0,
            run_dir: run_dir.clone(),
            created_at: 0,
        },
    );

    if !write_files {
        return;
    }
    std::fs::create_dir_all(&run_dir).unwrap();
    let container = Container::new(ContainerConfig {
        id: id.to_string(),
        name: name.to_string(),
        sandbox_id: pod_id.to_string(),
        image: "docker.io/library/busybox:latest".to_string(),
        run_dir,
        log_path: None,
        cgroup_path: String::new(),
        infra: false,
        created_at: Utc::now(),
    });
    container.config().to_disk().unwrap();
    container.state_to_disk().unwrap();
}
