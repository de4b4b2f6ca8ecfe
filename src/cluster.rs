//! Cluster access for the harness
//!
//! Everything the harness observes or creates in the cluster goes through
//! [`ClusterClient`], so the waiters and the scenario runner can be driven
//! by a mock in unit tests and by [`KubeClusterClient`] against a real
//! cluster.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, warn};

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Lines of container log kept per container in diagnostics
const LOG_TAIL_LINES: i64 = 200;

/// The "Ready" pod condition type
const CONDITION_READY: &str = "Ready";
/// The "True" status value for conditions
const STATUS_TRUE: &str = "True";

/// Lifecycle phase of a pod as reported in `status.phase`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodPhase {
    /// Accepted but not all containers started
    Pending,
    /// Bound to a node with at least one container running
    Running,
    /// All containers exited zero and will not restart
    Succeeded,
    /// All containers exited and at least one failed
    Failed,
    /// State could not be obtained
    Unknown,
}

impl PodPhase {
    /// Parse the API server's phase string; anything unrecognised is `Unknown`.
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }

    /// Phase name as used by the API server
    pub fn as_str(&self) -> &'static str {
        match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        }
    }

    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, PodPhase::Succeeded | PodPhase::Failed)
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allocatable count of one resource on one node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeAllocatable {
    /// Node name
    pub node: String,
    /// Allocatable quantity (0 when the node does not report the resource)
    pub quantity: i64,
}

/// Log output of one container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerLog {
    /// Pod name
    pub pod: String,
    /// Container name
    pub container: String,
    /// Log text, or the error that prevented fetching it
    pub log: String,
}

/// Trait abstracting the cluster operations the harness needs
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client against a cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Count pods matching `selector` that are both Running and Ready
    async fn count_running_ready(&self, namespace: &str, selector: &str) -> Result<u32, Error>;

    /// Allocatable quantity of `resource` on every node
    async fn allocatable_by_node(&self, resource: &str) -> Result<Vec<NodeAllocatable>, Error>;

    /// Create a pod, returning the object as stored by the API server
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, Error>;

    /// Current phase of a pod, `None` if it does not exist
    async fn pod_phase(&self, namespace: &str, name: &str) -> Result<Option<PodPhase>, Error>;

    /// Human-readable dump of pods and events in a namespace
    async fn dump_namespace(&self, namespace: &str) -> Result<String, Error>;

    /// Logs of containers that are not ready or exited non-zero in pods matching `selector`
    async fn failed_container_logs(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<ContainerLog>, Error>;

    /// Logs of every container in a pod
    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<Vec<ContainerLog>, Error>;

    /// Create a namespace named `<base_name>-<random suffix>`, returning its name
    async fn create_namespace(&self, base_name: &str) -> Result<String, Error>;

    /// Delete a namespace without waiting for finalization
    async fn delete_namespace(&self, name: &str) -> Result<(), Error>;
}

/// [`ClusterClient`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using an explicit kubeconfig, or the inferred config when `None`
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self, Error> {
        let mut config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to read kubeconfig {}: {}", path.display(), e),
                    )
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        Error::internal_with_context(
                            "create_client",
                            format!("failed to load kubeconfig: {}", e),
                        )
                    })?
            }
            None => Config::infer().await.map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to infer config: {}", e),
                )
            })?,
        };
        config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
        config.read_timeout = Some(DEFAULT_READ_TIMEOUT);

        let client = Client::try_from(config).map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to create client: {}", e))
        })?;
        Ok(Self::new(client))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn container_log(&self, namespace: &str, pod: &str, container: &str) -> ContainerLog {
        let params = LogParams {
            container: Some(container.to_string()),
            tail_lines: Some(LOG_TAIL_LINES),
            ..Default::default()
        };
        let log = match self.pods(namespace).logs(pod, &params).await {
            Ok(log) => log,
            Err(e) => format!("<failed to fetch logs: {}>", e),
        };
        ContainerLog {
            pod: pod.to_string(),
            container: container.to_string(),
            log,
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn count_running_ready(&self, namespace: &str, selector: &str) -> Result<u32, Error> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default().labels(selector))
            .await?;
        Ok(pods.items.iter().filter(|p| is_running_and_ready(p)).count() as u32)
    }

    async fn allocatable_by_node(&self, resource: &str) -> Result<Vec<NodeAllocatable>, Error> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes.list(&ListParams::default()).await?;

        Ok(list
            .items
            .iter()
            .map(|node| NodeAllocatable {
                node: node.metadata.name.clone().unwrap_or_default(),
                quantity: node
                    .status
                    .as_ref()
                    .and_then(|s| s.allocatable.as_ref())
                    .and_then(|a| a.get(resource))
                    .map(parse_count)
                    .unwrap_or(0),
            })
            .collect())
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, Error> {
        Ok(self.pods(namespace).create(&PostParams::default(), pod).await?)
    }

    async fn pod_phase(&self, namespace: &str, name: &str) -> Result<Option<PodPhase>, Error> {
        let pod = self.pods(namespace).get_opt(name).await?;
        Ok(pod.map(|p| {
            p.status
                .and_then(|s| s.phase)
                .map(|phase| PodPhase::parse(&phase))
                .unwrap_or(PodPhase::Pending)
        }))
    }

    async fn dump_namespace(&self, namespace: &str) -> Result<String, Error> {
        let pods = self.pods(namespace).list(&ListParams::default()).await?;
        let events: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let events = events.list(&ListParams::default()).await?;

        let mut out = String::new();
        let _ = writeln!(out, "namespace {}: {} pod(s)", namespace, pods.items.len());
        for pod in &pods.items {
            out.push_str(&describe_pod(pod));
        }
        let _ = writeln!(out, "events ({}):", events.items.len());
        for event in &events.items {
            let _ = writeln!(
                out,
                "  {} {}/{}: {} {}",
                event.type_.as_deref().unwrap_or("-"),
                event.involved_object.kind.as_deref().unwrap_or("-"),
                event.involved_object.name.as_deref().unwrap_or("-"),
                event.reason.as_deref().unwrap_or("-"),
                event.message.as_deref().unwrap_or(""),
            );
        }
        Ok(out)
    }

    async fn failed_container_logs(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<ContainerLog>, Error> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default().labels(selector))
            .await?;

        let mut logs = Vec::new();
        for pod in &pods.items {
            let Some(pod_name) = pod.metadata.name.as_deref() else {
                continue;
            };
            for container in failed_containers(pod) {
                logs.push(self.container_log(namespace, pod_name, &container).await);
            }
        }
        Ok(logs)
    }

    async fn pod_logs(&self, namespace: &str, name: &str) -> Result<Vec<ContainerLog>, Error> {
        let Some(pod) = self.pods(namespace).get_opt(name).await? else {
            return Ok(Vec::new());
        };

        let mut logs = Vec::new();
        for container in pod.spec.iter().flat_map(|s| s.containers.iter()) {
            logs.push(self.container_log(namespace, name, &container.name).await);
        }
        Ok(logs)
    }

    async fn create_namespace(&self, base_name: &str) -> Result<String, Error> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}-", base_name)),
                ..Default::default()
            },
            ..Default::default()
        };
        let created = namespaces.create(&PostParams::default(), &ns).await?;
        let name = created.metadata.name.ok_or_else(|| {
            Error::internal_with_context(
                "create_namespace",
                format!("API server returned no name for {}-*", base_name),
            )
        })?;
        debug!(namespace = %name, "created namespace");
        Ok(name)
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), Error> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        match namespaces.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                warn!(namespace = %name, "namespace already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether a pod is in the Running phase with its Ready condition True
pub fn is_running_and_ready(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return false;
    };
    let running = status.phase.as_deref() == Some(PodPhase::Running.as_str());
    let ready = status
        .conditions
        .as_ref()
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == CONDITION_READY && c.status == STATUS_TRUE)
        })
        .unwrap_or(false);
    running && ready
}

/// Names of containers that are not ready or terminated with a non-zero exit code.
///
/// A container that terminated with exit code 0 completed and is not failed,
/// even though it is no longer ready.
pub fn failed_containers(pod: &Pod) -> Vec<String> {
    pod.status
        .iter()
        .flat_map(|s| s.container_statuses.iter().flatten())
        .filter(|cs| match cs.state.as_ref().and_then(|s| s.terminated.as_ref()) {
            Some(terminated) => terminated.exit_code != 0,
            None => !cs.ready,
        })
        .map(|cs| cs.name.clone())
        .collect()
}

/// Whole-unit count from a resource quantity.
///
/// Extended resources are always integral; anything else counts as zero.
pub fn parse_count(quantity: &Quantity) -> i64 {
    match quantity.0.trim().parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            debug!(quantity = %quantity.0, "non-integral quantity treated as zero");
            0
        }
    }
}

fn describe_pod(pod: &Pod) -> String {
    let mut out = String::new();
    let name = pod.metadata.name.as_deref().unwrap_or("<unnamed>");
    let status = pod.status.as_ref();
    let _ = writeln!(
        out,
        "  pod {} phase={} node={}",
        name,
        status.and_then(|s| s.phase.as_deref()).unwrap_or("-"),
        pod.spec
            .as_ref()
            .and_then(|s| s.node_name.as_deref())
            .unwrap_or("-"),
    );
    for cond in status.iter().flat_map(|s| s.conditions.iter().flatten()) {
        let _ = writeln!(
            out,
            "    condition {}={} {}",
            cond.type_,
            cond.status,
            cond.message.as_deref().unwrap_or("")
        );
    }
    for cs in status.iter().flat_map(|s| s.container_statuses.iter().flatten()) {
        let state = cs.state.as_ref();
        let detail = if let Some(t) = state.and_then(|s| s.terminated.as_ref()) {
            format!(
                "terminated exit={} reason={}",
                t.exit_code,
                t.reason.as_deref().unwrap_or("-")
            )
        } else if let Some(w) = state.and_then(|s| s.waiting.as_ref()) {
            format!("waiting reason={}", w.reason.as_deref().unwrap_or("-"))
        } else {
            "running".to_string()
        };
        let _ = writeln!(
            out,
            "    container {} ready={} restarts={} {}",
            cs.name, cs.ready, cs.restart_count, detail
        );
    }
    out
}
