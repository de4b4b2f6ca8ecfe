//! `fpga-e2e run`: run the suite against a live cluster

use std::sync::Arc;

use clap::Args;
use tracing::{info, warn};

use crate::cluster::{ClusterClient, KubeClusterClient};
use crate::config::HarnessConfig;
use crate::context::TestContext;
use crate::deploy::{Deployer, ScriptDeployer};
use crate::scenario::{ScenarioRunner, ScenarioSettings};
use crate::suite::Suite;
use crate::Result;

/// Arguments for `run`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Cluster, script and timeout settings
    #[command(flatten)]
    pub config: HarnessConfig,

    /// Run only this scenario (repeatable; see `list`)
    #[arg(long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Leave the generated namespace in place after the run
    #[arg(long, env = "FPGA_E2E_KEEP_NAMESPACE")]
    pub keep_namespace: bool,

    /// Stop at the first failed scenario
    #[arg(long)]
    pub fail_fast: bool,
}

/// Resolve scripts, connect to the cluster and run the selected scenarios
pub async fn run(args: RunArgs) -> Result<()> {
    // Validate everything local before touching the cluster
    let suite = Suite::fpga_plugin()?.select(&args.scenarios)?;
    let settings = args.config.scenario_settings()?;

    let client = KubeClusterClient::connect(args.config.kubeconfig.as_deref()).await?;
    let deployer = ScriptDeployer::new(args.config.timeouts().deploy);

    run_suite(&args, suite, settings, Arc::new(client), Arc::new(deployer)).await
}

/// Run `suite` in the configured namespace, creating and deleting it when none was given.
pub async fn run_suite(
    args: &RunArgs,
    suite: Suite,
    settings: ScenarioSettings,
    client: Arc<dyn ClusterClient>,
    deployer: Arc<dyn Deployer>,
) -> Result<()> {
    let (namespace, owned) = match &args.config.namespace {
        Some(ns) => (ns.clone(), false),
        None => (client.create_namespace(&args.config.namespace_base).await?, true),
    };
    info!(
        %namespace,
        scenarios = suite.scenarios().len(),
        "running fpga plugin suite"
    );

    let ctx = TestContext::new(namespace.clone(), client.clone(), deployer)
        .with_timeouts(args.config.timeouts())
        .with_poll_interval(args.config.poll_interval());
    let runner = ScenarioRunner::new(ctx, settings);

    let report = suite.run(&runner, args.fail_fast).await;
    report.log_summary();

    if owned && !args.keep_namespace {
        match client.delete_namespace(&namespace).await {
            Ok(()) => info!(%namespace, "deleted namespace"),
            Err(e) => warn!(%namespace, error = %e, "failed to delete namespace"),
        }
    } else {
        info!(%namespace, "keeping namespace");
    }

    report.finish()
}
