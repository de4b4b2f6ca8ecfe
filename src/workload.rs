//! Test workload construction and submission
//!
//! A workload is a single-run pod requesting one unit of an FPGA function
//! plus the CPU and hugepages the NLB demo needs. Its command selects which
//! NLB sub-test the image runs.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Capabilities, Container, Pod, PodSpec, ResourceRequirements, SecurityContext,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::info;

use crate::context::TestContext;
use crate::resource_id::PodResource;
use crate::{Error, Result};

/// Name of the single workload container
pub const WORKLOAD_CONTAINER: &str = "nlb-demo";
/// CPU request and limit of the workload
pub const CPU_QUANTITY: &str = "1";
/// Hugepages resource the NLB demo allocates from
pub const HUGEPAGES_RESOURCE: &str = "hugepages-2Mi";
/// Hugepages request and limit of the workload
pub const HUGEPAGES_QUANTITY: &str = "20Mi";
/// Capability needed to lock the DMA buffers in memory
pub const IPC_LOCK_CAPABILITY: &str = "IPC_LOCK";
/// Pods run once; a failed sub-test must stay failed
const RESTART_POLICY_NEVER: &str = "Never";

/// Description of a single test workload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadSpec {
    /// Pod name, unique per scenario and correctness
    pub name: String,
    /// FPGA function requested
    pub resource: PodResource,
    /// Container image
    pub image: String,
    /// Container command (the NLB sub-test to run)
    pub command: Vec<String>,
}

impl WorkloadSpec {
    /// Describe a workload running `command` against one unit of `resource`
    pub fn new(
        name: impl Into<String>,
        resource: PodResource,
        image: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource,
            image: image.into(),
            command: vec![command.into()],
        }
    }

    /// Requests (and limits) of the workload container
    pub fn resource_list(&self) -> BTreeMap<String, Quantity> {
        BTreeMap::from([
            (self.resource.as_str().to_string(), Quantity("1".to_string())),
            ("cpu".to_string(), Quantity(CPU_QUANTITY.to_string())),
            (
                HUGEPAGES_RESOURCE.to_string(),
                Quantity(HUGEPAGES_QUANTITY.to_string()),
            ),
        ])
    }

    /// Build the pod object for `namespace`
    pub fn to_pod(&self, namespace: &str) -> Pod {
        let resources = self.resource_list();
        Pod {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                restart_policy: Some(RESTART_POLICY_NEVER.to_string()),
                containers: vec![Container {
                    name: WORKLOAD_CONTAINER.to_string(),
                    image: Some(self.image.clone()),
                    command: Some(self.command.clone()),
                    resources: Some(ResourceRequirements {
                        requests: Some(resources.clone()),
                        limits: Some(resources),
                        ..Default::default()
                    }),
                    security_context: Some(SecurityContext {
                        capabilities: Some(Capabilities {
                            add: Some(vec![IPC_LOCK_CAPABILITY.to_string()]),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// A submitted workload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkloadHandle {
    /// Pod name
    pub name: String,
    /// Namespace the pod lives in
    pub namespace: String,
}

/// Submit a workload for scheduling.
///
/// Any API error is fatal: it means the pod was malformed or admission
/// rejected it, not that scheduling failed.
pub async fn submit(ctx: &TestContext, spec: &WorkloadSpec) -> Result<WorkloadHandle> {
    info!(
        namespace = %ctx.namespace,
        workload = %spec.name,
        resource = %spec.resource,
        command = ?spec.command,
        "submitting workload"
    );

    let created = ctx
        .client
        .create_pod(&ctx.namespace, &spec.to_pod(&ctx.namespace))
        .await
        .map_err(|e| Error::submission(&spec.name, &ctx.namespace, e.to_string()))?;

    Ok(WorkloadHandle {
        name: created.metadata.name.unwrap_or_else(|| spec.name.clone()),
        namespace: ctx.namespace.clone(),
    })
}
