//! Integration tests against real FPGA hardware
//!
//! These stories deploy the admission webhook and device plugin with the
//! scripts from the plugin repository and check that the scheduler hands
//! out exactly the programmed accelerator function. They need nodes with
//! Arria10 devices and `FPGA_E2E_REPO_ROOT` pointing at the repository.

use fpga_e2e::config::{
    Timeouts, DEFAULT_WORKLOAD_IMAGE, PLUGIN_COMPONENT, PLUGIN_DEPLOY_SCRIPT, WEBHOOK_COMPONENT,
    WEBHOOK_DEPLOY_SCRIPT,
};
use fpga_e2e::deploy::locate_repo_file;
use fpga_e2e::scenario::{ScenarioRunner, ScenarioSettings, ScenarioStep};
use fpga_e2e::suite::Suite;

use super::helpers::{cleanup, connect, fresh_context, repo_root};

fn settings() -> ScenarioSettings {
    let root = repo_root().expect("FPGA_E2E_REPO_ROOT must point at the plugin repository");
    ScenarioSettings {
        webhook_script: locate_repo_file(Some(root.as_path()), WEBHOOK_DEPLOY_SCRIPT)
            .expect("webhook deploy script not found"),
        plugin_script: locate_repo_file(Some(root.as_path()), PLUGIN_DEPLOY_SCRIPT)
            .expect("plugin deploy script not found"),
        webhook_component: WEBHOOK_COMPONENT.to_string(),
        plugin_component: PLUGIN_COMPONENT.to_string(),
        image: DEFAULT_WORKLOAD_IMAGE.to_string(),
    }
}

/// Story: The full suite passes on a healthy FPGA cluster
///
/// Region mode runs twice with the functions swapped, then af mode. Every
/// scenario walks the whole step sequence, and the second region run only
/// passes if the region was reprogrammed in between.
#[tokio::test]
#[ignore = "requires FPGA nodes - run with: cargo test --test kind fpga_plugin -- --ignored"]
async fn story_suite_passes_on_fpga_nodes() {
    let settings = settings();
    let ctx = fresh_context(connect().await, Timeouts::default()).await;
    let runner = ScenarioRunner::new(ctx.clone(), settings);

    let suite = Suite::fpga_plugin().expect("suite definition is valid");
    let report = suite.run(&runner, false).await;
    report.log_summary();
    cleanup(&ctx).await;

    for result in &report.results {
        let steps = result
            .report
            .as_ref()
            .unwrap_or_else(|| panic!("{} failed: {:?}", result.name, result.error));
        assert!(steps.is_complete(), "{} skipped a step", result.name);
        assert_eq!(steps.last_step(), Some(ScenarioStep::Done));
    }
    report.finish().expect("every scenario should pass");
}

/// Story: Swapping the requested function forces a reprogram
///
/// Running only the two region scenarios back to back is the shortest
/// reproduction of a plugin that keeps the previous bitstream.
#[tokio::test]
#[ignore = "requires FPGA nodes - run with: cargo test --test kind fpga_plugin -- --ignored"]
async fn story_region_is_reprogrammed_between_runs() {
    let settings = settings();
    let ctx = fresh_context(connect().await, Timeouts::default()).await;
    let runner = ScenarioRunner::new(ctx.clone(), settings);

    let suite = Suite::fpga_plugin()
        .and_then(|s| s.select(&["region-nlb3-nlb0".to_string(), "region-nlb0-nlb3".to_string()]))
        .expect("region scenarios exist");
    let report = suite.run(&runner, true).await;
    report.log_summary();
    cleanup(&ctx).await;

    report.finish().expect("both region scenarios should pass");
}
