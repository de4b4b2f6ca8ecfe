//! Waiting for FPGA capacity to be advertised
//!
//! The webhook and plugin reporting ready does not mean the device has been
//! programmed and advertised yet, so this is a separate wait on the nodes'
//! allocatable resources.

use tracing::{debug, info};

use crate::context::TestContext;
use crate::poll::wait_until;
use crate::resource_id::NodeResource;
use crate::{Error, Result};

/// Wait until some node reports `resource` with a positive allocatable quantity.
///
/// Returns the names of the nodes advertising it.
pub async fn wait_allocatable(ctx: &TestContext, resource: &NodeResource) -> Result<Vec<String>> {
    info!(resource = %resource, "checking if the resource is allocatable");

    let client = ctx.client.as_ref();
    let name = resource.as_str();

    let nodes = wait_until(
        &format!("{} allocatable", name),
        ctx.poll_interval,
        ctx.timeouts.allocatable,
        || async move {
            match client.allocatable_by_node(name).await {
                Ok(nodes) => {
                    let advertising: Vec<String> = nodes
                        .into_iter()
                        .filter(|n| n.quantity > 0)
                        .map(|n| n.node)
                        .collect();
                    if advertising.is_empty() {
                        debug!(resource = %name, "no node advertises the resource yet");
                        Ok(None)
                    } else {
                        Ok(Some(advertising))
                    }
                }
                Err(e) => {
                    debug!(resource = %name, error = %e, "listing nodes failed");
                    Ok(None)
                }
            }
        },
    )
    .await
    .map_err(|e| {
        e.or_timeout(|elapsed| Error::ResourceTimeout {
            resource: name.to_string(),
            elapsed,
        })
    })?;

    info!(resource = %resource, nodes = ?nodes, "resource is allocatable");
    Ok(nodes)
}
