//! Integration tests for StopPodSandbox and RemovePodSandbox: ordering,
//! idempotence and error classification.

mod common;

use common::*;
use podlite::server::PodSandboxState;

/// Run one non-host-network sandbox and clear the call log.
async fn running_sandbox(ctx: &TestContext) -> String {
    let id = ctx
        .server
        .run_pod_sandbox(&pod_config("web", "default", false), &token())
        .await
        .unwrap();
    ctx.log.clear();
    id
}

// ============================================================================
// STOP: SUCCESS AND ORDERING
// ============================================================================

#[tokio::test]
async fn stop_orders_network_runtime_storage_refresh() {
    let ctx = TestContext::new().await;
    let id = running_sandbox(&ctx).await;

    ctx.server.stop_pod_sandbox(&id, &token()).await.unwrap();

    // Network teardown first, then process stop and bounded wait, then the
    // storage-level stop, and the status refresh as the final action.
    assert_eq!(
        ctx.log.snapshot(),
        vec![
            "network.tear_down_pod",
            "runtime.stop_container",
            "runtime.wait_container_state_stopped",
            "storage.stop_container",
            "runtime.update_container_status",
        ]
    );

    let sandboxes = ctx.server.list_pod_sandboxes().unwrap();
    assert_eq!(sandboxes[0].state, PodSandboxState::NotReady);
}

#[tokio::test]
async fn stop_twice_succeeds_without_new_adapter_calls() {
    let ctx = TestContext::new().await;
    let id = running_sandbox(&ctx).await;

    ctx.server.stop_pod_sandbox(&id, &token()).await.unwrap();
    ctx.log.clear();

    ctx.server.stop_pod_sandbox(&id, &token()).await.unwrap();
    assert!(ctx.log.snapshot().is_empty());
}

#[tokio::test]
async fn stop_skips_teardown_for_host_network_pods() {
    let ctx = TestContext::new().await;
    let id = ctx
        .server
        .run_pod_sandbox(&pod_config("web", "default", true), &token())
        .await
        .unwrap();
    ctx.log.clear();

    ctx.server.stop_pod_sandbox(&id, &token()).await.unwrap();
    assert!(!ctx.log.contains("network.tear_down_pod"));
}

// ============================================================================
// STOP: ERROR CLASSIFICATION
// ============================================================================

#[tokio::test]
async fn stop_succeeds_when_storage_stop_fails() {
    let ctx = TestContext::new().await;
    let id = running_sandbox(&ctx).await;
    ctx.storage.fail.arm("stop_container");

    // The infra process is already confirmed stopped at that point, so a
    // storage-level failure is recorded, not surfaced.
    ctx.server.stop_pod_sandbox(&id, &token()).await.unwrap();

    let events = ctx.log.snapshot();
    assert_eq!(events.last().unwrap(), "runtime.update_container_status");

    let sandboxes = ctx.server.list_pod_sandboxes().unwrap();
    assert_eq!(sandboxes[0].state, PodSandboxState::NotReady);
}

#[tokio::test]
async fn stop_fails_when_infra_stop_fails() {
    let ctx = TestContext::new().await;
    let id = running_sandbox(&ctx).await;
    ctx.runtime.fail.arm("stop_container");

    let result = ctx.server.stop_pod_sandbox(&id, &token()).await;
    assert!(result.is_err());

    // The sandbox keeps its prior state and a later stop can succeed.
    ctx.runtime.fail.disarm("stop_container");
    ctx.server.stop_pod_sandbox(&id, &token()).await.unwrap();
    assert_eq!(
        ctx.server.list_pod_sandboxes().unwrap()[0].state,
        PodSandboxState::NotReady
    );
}

#[tokio::test]
async fn stop_fails_when_wait_for_stop_fails() {
    let ctx = TestContext::new().await;
    let id = running_sandbox(&ctx).await;
    ctx.runtime.fail.arm("wait_container_state_stopped");

    let result = ctx.server.stop_pod_sandbox(&id, &token()).await;
    assert!(result.is_err());
    // The failure happened before the storage layer was touched
    assert!(!ctx.log.contains("storage.stop_container"));
}

#[tokio::test]
async fn stop_fails_when_network_teardown_fails() {
    let ctx = TestContext::new().await;
    let id = running_sandbox(&ctx).await;
    ctx.network.fail.arm("tear_down_pod");

    let result = ctx.server.stop_pod_sandbox(&id, &token()).await;
    assert!(result.is_err());

    // Teardown happens before the runtime or storage layers are touched,
    // so the sandbox remains in its prior running state.
    assert_eq!(ctx.log.snapshot(), vec!["network.tear_down_pod"]);
    assert_eq!(
        ctx.server.list_pod_sandboxes().unwrap()[0].state,
        PodSandboxState::Ready
    );
}

// ============================================================================
// STOP: IDENTIFIER HANDLING
// ============================================================================

#[tokio::test]
async fn stop_with_empty_id_is_an_error() {
    let ctx = TestContext::new().await;
    assert!(ctx.server.stop_pod_sandbox("", &token()).await.is_err());
    assert!(ctx.log.snapshot().is_empty());
}

#[tokio::test]
async fn stop_of_unknown_sandbox_succeeds() {
    let ctx = TestContext::new().await;

    // Tolerates races with a concurrent remove by design
    ctx.server
        .stop_pod_sandbox("deadbeef", &token())
        .await
        .unwrap();
    assert!(ctx.log.snapshot().is_empty());
}

// ============================================================================
// REMOVE
// ============================================================================

#[tokio::test]
async fn remove_requires_stopped_sandbox() {
    let ctx = TestContext::new().await;
    let id = running_sandbox(&ctx).await;

    let result = ctx.server.remove_pod_sandbox(&id, &token()).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not stopped"));
    assert_eq!(ctx.server.list_pod_sandboxes().unwrap().len(), 1);
}

#[tokio::test]
async fn remove_after_stop_releases_everything() {
    let ctx = TestContext::new().await;
    let id = running_sandbox(&ctx).await;

    ctx.server.stop_pod_sandbox(&id, &token()).await.unwrap();
    ctx.log.clear();
    ctx.server.remove_pod_sandbox(&id, &token()).await.unwrap();

    assert!(ctx.log.contains("storage.remove_pod_sandbox"));
    assert!(ctx.server.list_pod_sandboxes().unwrap().is_empty());

    // Name reservations are gone: the same pod can be created again.
    ctx.server
        .run_pod_sandbox(&pod_config("web", "default", false), &token())
        .await
        .unwrap();
}

#[tokio::test]
async fn remove_of_unknown_sandbox_succeeds() {
    let ctx = TestContext::new().await;
    ctx.server
        .remove_pod_sandbox("deadbeef", &token())
        .await
        .unwrap();
}

#[tokio::test]
async fn remove_twice_is_idempotent() {
    let ctx = TestContext::new().await;
    let id = running_sandbox(&ctx).await;

    ctx.server.stop_pod_sandbox(&id, &token()).await.unwrap();
    ctx.server.remove_pod_sandbox(&id, &token()).await.unwrap();
    ctx.server.remove_pod_sandbox(&id, &token()).await.unwrap();
}

#[tokio::test]
async fn remove_fails_when_storage_removal_fails() {
    let ctx = TestContext::new().await;
    let id = running_sandbox(&ctx).await;

    ctx.server.stop_pod_sandbox(&id, &token()).await.unwrap();
    ctx.storage.fail.arm("remove_pod_sandbox");

    let result = ctx.server.remove_pod_sandbox(&id, &token()).await;
    assert!(result.is_err());
}
