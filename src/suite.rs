//! The FPGA plugin suite: the three scenarios and their summary
//!
//! The region scenario runs twice with the functions swapped so the second
//! run only passes if the region is reprogrammed rather than left holding
//! the first run's bitstream. The af scenario covers preprogrammed devices.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::resource_id::{
    PluginMode, WebhookMode, ARRIA10_NODE_RESOURCE, NLB0_NODE_RESOURCE, NLB0_POD_RESOURCE,
    NLB3_POD_RESOURCE,
};
use crate::scenario::{Scenario, ScenarioReport, ScenarioRunner, ScenarioStep};
use crate::{Error, Result};

const SUITE_NAME: &str = "fpga plugin";
const MAX_SUMMARY_ERROR_LEN: usize = 200;

/// Outcome of one scenario within a suite run
#[derive(Clone, Debug)]
pub struct ScenarioResult {
    /// Scenario name
    pub name: String,
    /// Whether every step passed
    pub passed: bool,
    /// Wall-clock time of the scenario
    pub duration: Duration,
    /// Failure message, if it failed
    pub error: Option<String>,
    /// Step that failed, if it failed
    pub failed_step: Option<ScenarioStep>,
    /// Completed steps, if it passed
    pub report: Option<ScenarioReport>,
}

/// Results of a suite run
#[derive(Clone, Debug, Default)]
pub struct SuiteReport {
    /// Results in execution order
    pub results: Vec<ScenarioResult>,
    /// Scenarios not run because an earlier one failed with fail-fast set
    pub skipped: Vec<String>,
}

impl SuiteReport {
    /// Number of scenarios that passed
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Names of the scenarios that failed
    pub fn failed(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.name.clone())
            .collect()
    }

    /// Log a PASS/FAIL line per scenario and the totals
    pub fn log_summary(&self) {
        let total_duration: Duration = self.results.iter().map(|r| r.duration).sum();

        info!("========================================");
        info!("  {}", SUITE_NAME.to_uppercase());
        info!("========================================");
        for r in &self.results {
            let tag = if r.passed { "PASS" } else { "FAIL" };
            info!("  {tag}  {:40} {:.1}s", r.name, r.duration.as_secs_f64());
            if let Some(ref e) = r.error {
                let truncated: String = e.chars().take(MAX_SUMMARY_ERROR_LEN).collect();
                info!("        -> {truncated}");
            }
        }
        for name in &self.skipped {
            info!("  SKIP  {:40}", name);
        }
        info!("----------------------------------------");
        info!(
            "  {} passed, {} failed, {} skipped ({:.1}s total)",
            self.passed(),
            self.results.len() - self.passed(),
            self.skipped.len(),
            total_duration.as_secs_f64()
        );
        info!("========================================");
    }

    /// `Err(SuiteFailed)` naming every failed scenario, if any failed
    pub fn finish(&self) -> Result<()> {
        let names = self.failed();
        if names.is_empty() {
            Ok(())
        } else {
            Err(Error::SuiteFailed { names })
        }
    }
}

/// An ordered set of scenarios
#[derive(Clone, Debug)]
pub struct Suite {
    scenarios: Vec<Scenario>,
}

impl Suite {
    /// Create a suite from explicit scenarios
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    /// The FPGA plugin suite
    pub fn fpga_plugin() -> Result<Self> {
        Ok(Self::new(Self::default_scenarios()?))
    }

    /// Region twice with swapped functions, then af
    pub fn default_scenarios() -> Result<Vec<Scenario>> {
        Ok(vec![
            Scenario::builder()
                .plugin_mode(PluginMode::Region)
                .webhook_mode(WebhookMode::Orchestrated)
                .node_resource(ARRIA10_NODE_RESOURCE.parse()?)
                .pod_resource(NLB3_POD_RESOURCE.parse()?)
                .commands("nlb3", "nlb0")
                .build()?,
            Scenario::builder()
                .plugin_mode(PluginMode::Region)
                .webhook_mode(WebhookMode::Orchestrated)
                .node_resource(ARRIA10_NODE_RESOURCE.parse()?)
                .pod_resource(NLB0_POD_RESOURCE.parse()?)
                .commands("nlb0", "nlb3")
                .build()?,
            Scenario::builder()
                .plugin_mode(PluginMode::Af)
                .webhook_mode(WebhookMode::Preprogrammed)
                .node_resource(NLB0_NODE_RESOURCE.parse()?)
                .pod_resource(NLB0_POD_RESOURCE.parse()?)
                .commands("nlb0", "nlb3")
                .build()?,
        ])
    }

    /// Scenarios in execution order
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Keep only the named scenarios, preserving suite order.
    ///
    /// An empty list keeps everything; an unknown name is rejected.
    pub fn select(self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.scenarios.iter().any(|s| &s.name() == *n))
        {
            let known: Vec<String> = self.scenarios.iter().map(Scenario::name).collect();
            return Err(Error::validation_for_field(
                "scenario",
                format!("unknown scenario {:?}, expected one of: {}", unknown, known.join(", ")),
            ));
        }
        Ok(Self::new(
            self.scenarios
                .into_iter()
                .filter(|s| names.contains(&s.name()))
                .collect(),
        ))
    }

    /// Run every scenario in order.
    ///
    /// Scenarios are independent: a failure is recorded and the next one
    /// still runs, unless `fail_fast` is set.
    pub async fn run(&self, runner: &ScenarioRunner, fail_fast: bool) -> SuiteReport {
        let mut report = SuiteReport::default();

        for (i, scenario) in self.scenarios.iter().enumerate() {
            let name = scenario.name();
            let start = Instant::now();
            let result = runner.run(scenario).await;
            let duration = start.elapsed();

            match result {
                Ok(scenario_report) => report.results.push(ScenarioResult {
                    name,
                    passed: true,
                    duration,
                    error: None,
                    failed_step: None,
                    report: Some(scenario_report),
                }),
                Err(e) => {
                    warn!(scenario = %name, error = %e, "scenario failed");
                    report.results.push(ScenarioResult {
                        name,
                        passed: false,
                        duration,
                        error: Some(e.to_string()),
                        failed_step: e.step(),
                        report: None,
                    });
                    if fail_fast {
                        report.skipped = self.scenarios[i + 1..].iter().map(Scenario::name).collect();
                        break;
                    }
                }
            }
        }

        report
    }
}
