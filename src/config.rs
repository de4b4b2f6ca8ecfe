//! Harness configuration
//!
//! Every setting has a default matching the upstream deployment layout and
//! can be overridden by flag or `FPGA_E2E_*` environment variable.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::deploy::locate_repo_file;
use crate::scenario::ScenarioSettings;
use crate::Result;

/// Default namespace base name; the API server appends a random suffix
pub const DEFAULT_NAMESPACE_BASE: &str = "fpgaplugin-e2e";
/// Webhook deploy script, relative to the repository root
pub const WEBHOOK_DEPLOY_SCRIPT: &str = "scripts/webhook-deploy.sh";
/// Device plugin deploy script, relative to the repository root
pub const PLUGIN_DEPLOY_SCRIPT: &str = "scripts/deploy-fpgaplugin.sh";
/// Image whose entrypoint runs the requested NLB sub-test
pub const DEFAULT_WORKLOAD_IMAGE: &str = "intel/opae-nlb-demo:devel";
/// `app` label value of the admission webhook pods
pub const WEBHOOK_COMPONENT: &str = "intel-fpga-webhook";
/// `app` label value of the device plugin pods
pub const PLUGIN_COMPONENT: &str = "intel-fpga-plugin";

/// Smallest accepted poll interval, in milliseconds
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Upper bounds for each blocking step of a scenario
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Deploy script run
    pub deploy: Duration,
    /// Component pods running and ready
    pub readiness: Duration,
    /// Resource allocatable on some node
    pub allocatable: Duration,
    /// Workload reaching its terminal phase
    pub outcome: Duration,
    /// Diagnostic capture after a failed wait
    pub diagnostics: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            deploy: Duration::from_secs(120),
            readiness: Duration::from_secs(10),
            allocatable: Duration::from_secs(30),
            outcome: Duration::from_secs(60),
            diagnostics: Duration::from_secs(60),
        }
    }
}

/// Settings shared by every scenario of a run
#[derive(Args, Debug, Clone)]
pub struct HarnessConfig {
    /// Path to kubeconfig (defaults to KUBECONFIG / in-cluster config)
    #[arg(long, env = "FPGA_E2E_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Use this existing namespace instead of creating a fresh one
    #[arg(long, env = "FPGA_E2E_NAMESPACE")]
    pub namespace: Option<String>,

    /// Base name for the generated namespace
    #[arg(long, env = "FPGA_E2E_NAMESPACE_BASE", default_value = DEFAULT_NAMESPACE_BASE)]
    pub namespace_base: String,

    /// Repository root holding the deploy scripts (searched upwards from cwd if unset)
    #[arg(long, env = "FPGA_E2E_REPO_ROOT")]
    pub repo_root: Option<PathBuf>,

    /// Webhook deploy script, relative to the repository root
    #[arg(long, env = "FPGA_E2E_WEBHOOK_SCRIPT", default_value = WEBHOOK_DEPLOY_SCRIPT)]
    pub webhook_script: String,

    /// Device plugin deploy script, relative to the repository root
    #[arg(long, env = "FPGA_E2E_PLUGIN_SCRIPT", default_value = PLUGIN_DEPLOY_SCRIPT)]
    pub plugin_script: String,

    /// Container image for test workloads
    #[arg(long, env = "FPGA_E2E_IMAGE", default_value = DEFAULT_WORKLOAD_IMAGE)]
    pub image: String,

    /// `app` label of the webhook pods
    #[arg(long, env = "FPGA_E2E_WEBHOOK_COMPONENT", default_value = WEBHOOK_COMPONENT)]
    pub webhook_component: String,

    /// `app` label of the device plugin pods
    #[arg(long, env = "FPGA_E2E_PLUGIN_COMPONENT", default_value = PLUGIN_COMPONENT)]
    pub plugin_component: String,

    /// Deploy script timeout in seconds
    #[arg(long, env = "FPGA_E2E_DEPLOY_TIMEOUT", default_value_t = 120)]
    pub deploy_timeout_secs: u64,

    /// Component readiness timeout in seconds
    #[arg(long, env = "FPGA_E2E_READY_TIMEOUT", default_value_t = 10)]
    pub ready_timeout_secs: u64,

    /// Resource allocatable timeout in seconds
    #[arg(long, env = "FPGA_E2E_ALLOCATABLE_TIMEOUT", default_value_t = 30)]
    pub allocatable_timeout_secs: u64,

    /// Workload outcome timeout in seconds
    #[arg(long, env = "FPGA_E2E_OUTCOME_TIMEOUT", default_value_t = 60)]
    pub outcome_timeout_secs: u64,

    /// Diagnostic capture timeout in seconds
    #[arg(long, env = "FPGA_E2E_DIAGNOSTICS_TIMEOUT", default_value_t = 60)]
    pub diagnostics_timeout_secs: u64,

    /// Interval between polls in milliseconds
    #[arg(
        long,
        env = "FPGA_E2E_POLL_INTERVAL_MS",
        default_value_t = 2000,
        value_parser = clap::value_parser!(u64).range(MIN_POLL_INTERVAL_MS..)
    )]
    pub poll_interval_ms: u64,
}

impl HarnessConfig {
    /// Timeouts for the blocking steps
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            deploy: Duration::from_secs(self.deploy_timeout_secs),
            readiness: Duration::from_secs(self.ready_timeout_secs),
            allocatable: Duration::from_secs(self.allocatable_timeout_secs),
            outcome: Duration::from_secs(self.outcome_timeout_secs),
            diagnostics: Duration::from_secs(self.diagnostics_timeout_secs),
        }
    }

    /// Interval between polls of every waiter
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Resolve the deploy scripts and collect the per-scenario settings.
    ///
    /// Fails before any cluster work if a script cannot be found.
    pub fn scenario_settings(&self) -> Result<ScenarioSettings> {
        let root = self.repo_root.as_deref();
        Ok(ScenarioSettings {
            webhook_script: locate_repo_file(root, &self.webhook_script)?,
            plugin_script: locate_repo_file(root, &self.plugin_script)?,
            webhook_component: self.webhook_component.clone(),
            plugin_component: self.plugin_component.clone(),
            image: self.image.clone(),
        })
    }
}
