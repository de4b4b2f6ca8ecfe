//! Waiting for deployed components to come up
//!
//! A component is identified by its `app` label. The wait is a hard gate:
//! when it times out, the namespace and the component's failed containers
//! are dumped to the log before the error is returned.

use tracing::{debug, info};

use crate::context::TestContext;
use crate::diagnostics::{capture_namespace, on_failure};
use crate::poll::wait_until;
use crate::{Error, Result};

/// Label key selecting a component's pods
pub const APP_LABEL: &str = "app";

/// Label selector for a component's pods
pub fn app_selector(component: &str) -> String {
    format!("{}={}", APP_LABEL, component)
}

/// Wait for at least `min_count` pods of `component` to be running and ready.
pub async fn wait_ready(ctx: &TestContext, component: &str, min_count: u32) -> Result<()> {
    let selector = app_selector(component);
    info!(namespace = %ctx.namespace, %component, "waiting for component availability");

    let client = ctx.client.as_ref();
    let namespace = ctx.namespace.as_str();
    let label_selector = selector.as_str();

    let wait = async {
        wait_until(
            &format!("{} running and ready", component),
            ctx.poll_interval,
            ctx.timeouts.readiness,
            || async move {
                match client.count_running_ready(namespace, label_selector).await {
                    Ok(ready) if ready >= min_count => Ok(Some(ready)),
                    Ok(ready) => {
                        debug!(%component, ready, min_count, "component not ready yet");
                        Ok(None)
                    }
                    Err(e) => {
                        debug!(%component, error = %e, "listing component pods failed");
                        Ok(None)
                    }
                }
            },
        )
        .await
        .map_err(|e| {
            e.or_timeout(|elapsed| Error::ReadinessTimeout {
                component: component.to_string(),
                namespace: ctx.namespace.clone(),
                min_count,
                elapsed,
            })
        })
    };

    let ready = on_failure(wait, ctx.timeouts.diagnostics, || {
        capture_namespace(ctx, &selector)
    }).await?;
    info!(namespace = %ctx.namespace, %component, ready, "component is running and ready");
    Ok(())
}
