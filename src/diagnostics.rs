//! Best-effort diagnostic capture on failure
//!
//! Cluster state is usually torn down right after a failed run, so the
//! evidence is logged before the error propagates. Capture never replaces
//! the original error: its own failures are only logged.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::context::TestContext;
use crate::Result;

/// Run `fut`; if it fails, run `capture` before returning the error.
///
/// Capture gets at most `limit`. When it runs out, what was captured so far
/// stays logged and the original error is returned.
pub async fn on_failure<T, Fut, C, CFut>(fut: Fut, limit: Duration, capture: C) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
    C: FnOnce() -> CFut,
    CFut: Future<Output = ()>,
{
    match fut.await {
        Ok(value) => Ok(value),
        Err(e) => {
            if tokio::time::timeout(limit, capture()).await.is_err() {
                warn!(?limit, error = %e, "diagnostic capture timed out");
            }
            Err(e)
        }
    }
}

/// Log the namespace dump and logs of failed containers matching `selector`.
pub async fn capture_namespace(ctx: &TestContext, selector: &str) {
    dump_namespace(ctx).await;

    match ctx
        .client
        .failed_container_logs(&ctx.namespace, selector)
        .await
    {
        Ok(logs) => {
            for l in logs {
                warn!(
                    namespace = %ctx.namespace,
                    pod = %l.pod,
                    container = %l.container,
                    "failed container logs:\n{}",
                    l.log
                );
            }
        }
        Err(e) => warn!(namespace = %ctx.namespace, %selector, error = %e, "unable to fetch container logs"),
    }
}

/// Log the namespace dump and every container log of one workload.
pub async fn capture_workload(ctx: &TestContext, name: &str) {
    match ctx.client.pod_logs(&ctx.namespace, name).await {
        Ok(logs) => {
            for l in logs {
                warn!(
                    namespace = %ctx.namespace,
                    pod = %l.pod,
                    container = %l.container,
                    "workload logs:\n{}",
                    l.log
                );
            }
        }
        Err(e) => warn!(namespace = %ctx.namespace, workload = %name, error = %e, "unable to fetch workload logs"),
    }

    dump_namespace(ctx).await;
}

async fn dump_namespace(ctx: &TestContext) {
    match ctx.client.dump_namespace(&ctx.namespace).await {
        Ok(dump) => warn!(namespace = %ctx.namespace, "namespace dump:\n{}", dump),
        Err(e) => warn!(namespace = %ctx.namespace, error = %e, "unable to dump namespace"),
    }
}
