//! Shared setup for the cluster stories

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fpga_e2e::cluster::{ClusterClient, KubeClusterClient};
use fpga_e2e::config::Timeouts;
use fpga_e2e::context::TestContext;
use fpga_e2e::deploy::ScriptDeployer;

/// Base name for namespaces created by these tests
pub const TEST_NAMESPACE_BASE: &str = "fpga-e2e-it";

/// Connect with the ambient kubeconfig
pub async fn connect() -> Arc<dyn ClusterClient> {
    let kubeconfig = std::env::var_os("KUBECONFIG").map(PathBuf::from);
    let client = KubeClusterClient::connect(kubeconfig.as_deref())
        .await
        .expect("failed to connect to cluster");
    Arc::new(client)
}

/// Create a fresh namespace and a context bound to it
pub async fn fresh_context(client: Arc<dyn ClusterClient>, timeouts: Timeouts) -> TestContext {
    let namespace = client
        .create_namespace(TEST_NAMESPACE_BASE)
        .await
        .expect("failed to create namespace");
    TestContext::new(
        namespace,
        client,
        Arc::new(ScriptDeployer::new(timeouts.deploy)),
    )
    .with_timeouts(timeouts)
    .with_poll_interval(Duration::from_secs(1))
}

/// Delete the context's namespace, tolerating failures
pub async fn cleanup(ctx: &TestContext) {
    if let Err(e) = ctx.client.delete_namespace(&ctx.namespace).await {
        eprintln!("failed to delete namespace {}: {}", ctx.namespace, e);
    }
}

/// Repository holding the deploy scripts, from `FPGA_E2E_REPO_ROOT`
pub fn repo_root() -> Option<PathBuf> {
    std::env::var_os("FPGA_E2E_REPO_ROOT").map(PathBuf::from)
}
