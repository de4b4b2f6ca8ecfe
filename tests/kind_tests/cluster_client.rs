//! Integration tests for the Kubernetes-backed cluster client
//!
//! These stories exercise the waiters against a real API server with plain
//! busybox pods, so they hold on any cluster without FPGA hardware.

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use fpga_e2e::config::Timeouts;
use fpga_e2e::outcome::{expect_failure, expect_success};
use fpga_e2e::readiness::wait_ready;
use fpga_e2e::resource_id::{NodeResource, NLB0_POD_RESOURCE};
use fpga_e2e::resources::wait_allocatable;
use fpga_e2e::workload::{submit, WorkloadHandle, WorkloadSpec};
use fpga_e2e::Error;

use super::helpers::{cleanup, connect, fresh_context, TEST_NAMESPACE_BASE};

// =============================================================================
// Test Fixtures
// =============================================================================

const BUSYBOX_IMAGE: &str = "busybox:1.36";

fn short_timeouts() -> Timeouts {
    Timeouts {
        deploy: Duration::from_secs(30),
        readiness: Duration::from_secs(90),
        allocatable: Duration::from_secs(3),
        outcome: Duration::from_secs(90),
        diagnostics: Duration::from_secs(30),
    }
}

/// A single-run busybox pod executing `script`
fn busybox_pod(name: &str, app: Option<&str>, script: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: app.map(|a| BTreeMap::from([("app".to_string(), a.to_string())])),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".to_string()),
            containers: vec![Container {
                name: "main".to_string(),
                image: Some(BUSYBOX_IMAGE.to_string()),
                command: Some(vec!["sh".to_string(), "-c".to_string(), script.to_string()]),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

// =============================================================================
// Namespace Stories
// =============================================================================

/// Story: Each run gets its own generated namespace
///
/// The harness assumes exclusive use of its namespace, so it asks the API
/// server for a fresh one and removes it afterwards.
#[tokio::test]
#[ignore = "requires a cluster - run with: cargo test --test kind -- --ignored"]
async fn story_harness_runs_in_a_generated_namespace() {
    let client = connect().await;

    let first = client
        .create_namespace(TEST_NAMESPACE_BASE)
        .await
        .expect("failed to create namespace");
    let second = client
        .create_namespace(TEST_NAMESPACE_BASE)
        .await
        .expect("failed to create namespace");

    assert!(first.starts_with(&format!("{}-", TEST_NAMESPACE_BASE)));
    assert_ne!(first, second, "generated namespaces must not collide");

    client.delete_namespace(&first).await.expect("failed to delete namespace");
    client.delete_namespace(&second).await.expect("failed to delete namespace");
}

// =============================================================================
// Outcome Stories
// =============================================================================

/// Story: A workload that exits zero is verified as a success, and one that
/// exits non-zero as a failure
#[tokio::test]
#[ignore = "requires a cluster - run with: cargo test --test kind -- --ignored"]
async fn story_terminal_phases_are_verified() {
    let ctx = fresh_context(connect().await, short_timeouts()).await;

    ctx.client
        .create_pod(&ctx.namespace, &busybox_pod("exits-zero", None, "echo done"))
        .await
        .expect("failed to create pod");
    ctx.client
        .create_pod(&ctx.namespace, &busybox_pod("exits-one", None, "echo broken; exit 1"))
        .await
        .expect("failed to create pod");

    let ok = WorkloadHandle {
        name: "exits-zero".to_string(),
        namespace: ctx.namespace.clone(),
    };
    let failing = WorkloadHandle {
        name: "exits-one".to_string(),
        namespace: ctx.namespace.clone(),
    };

    let success = expect_success(&ctx, &ok).await;
    let failure = expect_failure(&ctx, &failing).await;
    let logs = ctx.client.pod_logs(&ctx.namespace, "exits-one").await;
    cleanup(&ctx).await;

    success.expect("exit 0 should be Succeeded");
    failure.expect("exit 1 should be Failed");
    let logs = logs.expect("failed to read logs");
    assert!(logs.iter().any(|l| l.log.contains("broken")));
}

/// Story: Expecting failure from a workload that succeeds aborts at once
#[tokio::test]
#[ignore = "requires a cluster - run with: cargo test --test kind -- --ignored"]
async fn story_opposite_phase_is_an_unexpected_outcome() {
    let ctx = fresh_context(connect().await, short_timeouts()).await;

    ctx.client
        .create_pod(&ctx.namespace, &busybox_pod("exits-zero", None, "true"))
        .await
        .expect("failed to create pod");
    let handle = WorkloadHandle {
        name: "exits-zero".to_string(),
        namespace: ctx.namespace.clone(),
    };

    let result = expect_failure(&ctx, &handle).await;
    cleanup(&ctx).await;

    match result {
        Err(Error::UnexpectedOutcome { actual, .. }) => assert_eq!(actual, "Succeeded"),
        other => panic!("expected UnexpectedOutcome, got {other:?}"),
    }
}

/// Story: An FPGA workload on a cluster without FPGA capacity never runs
///
/// The pod is accepted by the API server but stays Pending, so the outcome
/// wait ends in a timeout that reports the last phase it saw.
#[tokio::test]
#[ignore = "requires a cluster - run with: cargo test --test kind -- --ignored"]
async fn story_unschedulable_workload_times_out_pending() {
    let timeouts = Timeouts {
        outcome: Duration::from_secs(10),
        ..short_timeouts()
    };
    let ctx = fresh_context(connect().await, timeouts).await;

    let spec = WorkloadSpec::new(
        "fpgaplugin-nlb-af-nlb0-nlb3-correct",
        NLB0_POD_RESOURCE.parse().expect("valid pod resource"),
        "intel/opae-nlb-demo:devel",
        "nlb0",
    );
    let handle = submit(&ctx, &spec).await;
    let result = match &handle {
        Ok(h) => Some(expect_success(&ctx, h).await),
        Err(_) => None,
    };
    cleanup(&ctx).await;

    handle.expect("submission should be accepted");
    match result {
        Some(Err(Error::OutcomeTimeout { last_phase, .. })) => assert_eq!(last_phase, "Pending"),
        other => panic!("expected OutcomeTimeout, got {other:?}"),
    }
}

// =============================================================================
// Readiness and Capacity Stories
// =============================================================================

/// Story: Readiness counts running pods by their app label
#[tokio::test]
#[ignore = "requires a cluster - run with: cargo test --test kind -- --ignored"]
async fn story_running_pod_satisfies_readiness() {
    let ctx = fresh_context(connect().await, short_timeouts()).await;

    ctx.client
        .create_pod(
            &ctx.namespace,
            &busybox_pod("sleeper", Some("fpga-e2e-sleeper"), "sleep 3600"),
        )
        .await
        .expect("failed to create pod");

    let result = wait_ready(&ctx, "fpga-e2e-sleeper", 1).await;
    let count = ctx
        .client
        .count_running_ready(&ctx.namespace, "app=fpga-e2e-sleeper")
        .await;
    cleanup(&ctx).await;

    result.expect("sleeper should be ready");
    assert_eq!(count.expect("failed to count pods"), 1);
}

/// Story: A capacity nobody advertises times out instead of hanging
#[tokio::test]
#[ignore = "requires a cluster - run with: cargo test --test kind -- --ignored"]
async fn story_unadvertised_capacity_times_out() {
    let ctx = fresh_context(connect().await, short_timeouts()).await;
    let resource: NodeResource = "fpga.intel.com/region-00000000000000000000000000000000"
        .parse()
        .expect("valid node resource");

    let result = wait_allocatable(&ctx, &resource).await;
    cleanup(&ctx).await;

    match result {
        Err(Error::ResourceTimeout { elapsed, .. }) => assert!(elapsed < Duration::from_secs(10)),
        other => panic!("expected ResourceTimeout, got {other:?}"),
    }
}

/// Story: A namespace dump lists the pods and their state
#[tokio::test]
#[ignore = "requires a cluster - run with: cargo test --test kind -- --ignored"]
async fn story_namespace_dump_describes_pods() {
    let ctx = fresh_context(connect().await, short_timeouts()).await;

    ctx.client
        .create_pod(&ctx.namespace, &busybox_pod("dumped", Some("dumped"), "sleep 3600"))
        .await
        .expect("failed to create pod");
    let dump = ctx.client.dump_namespace(&ctx.namespace).await;
    cleanup(&ctx).await;

    let dump = dump.expect("failed to dump namespace");
    assert!(dump.contains("dumped"));
}
