//! Per-run context handed to every harness step

use std::sync::Arc;
use std::time::Duration;

use crate::cluster::ClusterClient;
use crate::config::Timeouts;
use crate::deploy::Deployer;

/// Default interval between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Namespace, cluster handles and timing shared by the steps of a scenario.
///
/// Scenarios share nothing mutable through this: the namespace is the only
/// shared cluster state, and each scenario names its workloads uniquely.
#[derive(Clone)]
pub struct TestContext {
    /// Namespace all components and workloads are deployed into
    pub namespace: String,
    /// Cluster API access
    pub client: Arc<dyn ClusterClient>,
    /// Component deployment
    pub deployer: Arc<dyn Deployer>,
    /// Upper bounds for the blocking steps
    pub timeouts: Timeouts,
    /// Interval between polls of every waiter
    pub poll_interval: Duration,
}

impl TestContext {
    /// Create a context with default timeouts and poll interval
    pub fn new(
        namespace: impl Into<String>,
        client: Arc<dyn ClusterClient>,
        deployer: Arc<dyn Deployer>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            client,
            deployer,
            timeouts: Timeouts::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Replace the timeouts
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Replace the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("namespace", &self.namespace)
            .field("timeouts", &self.timeouts)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
