//! One end-to-end scheduling scenario
//!
//! A scenario deploys the admission webhook and the device plugin in a
//! matching pair of modes, waits for the FPGA capacity to be advertised,
//! then proves both sides of the isolation contract: a workload running the
//! programmed function succeeds, and one running a sibling function fails.
//!
//! The steps are strictly sequential. No step starts before the previous
//! one's wait condition holds, and the first failure ends the scenario.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, info_span, Instrument};

use crate::context::TestContext;
use crate::outcome::{expect_failure, expect_success};
use crate::readiness::wait_ready;
use crate::resource_id::{NodeResource, PluginMode, PodResource, WebhookMode};
use crate::resources::wait_allocatable;
use crate::workload::{submit, WorkloadSpec};
use crate::{Error, Result};

/// Prefix of every workload name
pub const WORKLOAD_NAME_PREFIX: &str = "fpgaplugin-nlb";

/// States of a scenario, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScenarioStep {
    /// Run the webhook deploy script
    DeployWebhook,
    /// Wait for the webhook pods
    WaitWebhookReady,
    /// Run the device plugin deploy script
    DeployAgent,
    /// Wait for the device plugin pods
    WaitAgentReady,
    /// Wait for a node to advertise the capacity
    WaitResourceAllocatable,
    /// Create the workload running the programmed function
    SubmitCorrect,
    /// Wait for it to succeed
    VerifySuccess,
    /// Create the workload running a sibling function
    SubmitIncorrect,
    /// Wait for it to fail
    VerifyFailure,
    /// Every step passed
    Done,
}

impl ScenarioStep {
    /// Steps that do work, in order. `Done` is reached after the last one.
    pub const SEQUENCE: [ScenarioStep; 9] = [
        ScenarioStep::DeployWebhook,
        ScenarioStep::WaitWebhookReady,
        ScenarioStep::DeployAgent,
        ScenarioStep::WaitAgentReady,
        ScenarioStep::WaitResourceAllocatable,
        ScenarioStep::SubmitCorrect,
        ScenarioStep::VerifySuccess,
        ScenarioStep::SubmitIncorrect,
        ScenarioStep::VerifyFailure,
    ];

    /// The step that follows this one, `None` once done
    pub fn next(&self) -> Option<ScenarioStep> {
        match self {
            ScenarioStep::DeployWebhook => Some(ScenarioStep::WaitWebhookReady),
            ScenarioStep::WaitWebhookReady => Some(ScenarioStep::DeployAgent),
            ScenarioStep::DeployAgent => Some(ScenarioStep::WaitAgentReady),
            ScenarioStep::WaitAgentReady => Some(ScenarioStep::WaitResourceAllocatable),
            ScenarioStep::WaitResourceAllocatable => Some(ScenarioStep::SubmitCorrect),
            ScenarioStep::SubmitCorrect => Some(ScenarioStep::VerifySuccess),
            ScenarioStep::VerifySuccess => Some(ScenarioStep::SubmitIncorrect),
            ScenarioStep::SubmitIncorrect => Some(ScenarioStep::VerifyFailure),
            ScenarioStep::VerifyFailure => Some(ScenarioStep::Done),
            ScenarioStep::Done => None,
        }
    }

    /// Step name as used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStep::DeployWebhook => "DeployWebhook",
            ScenarioStep::WaitWebhookReady => "WaitWebhookReady",
            ScenarioStep::DeployAgent => "DeployAgent",
            ScenarioStep::WaitAgentReady => "WaitAgentReady",
            ScenarioStep::WaitResourceAllocatable => "WaitResourceAllocatable",
            ScenarioStep::SubmitCorrect => "SubmitCorrect",
            ScenarioStep::VerifySuccess => "VerifySuccess",
            ScenarioStep::SubmitIncorrect => "SubmitIncorrect",
            ScenarioStep::VerifyFailure => "VerifyFailure",
            ScenarioStep::Done => "Done",
        }
    }
}

impl fmt::Display for ScenarioStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated scenario configuration
///
/// Only [`ScenarioBuilder::build`] creates one, and it cannot change
/// afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scenario {
    plugin_mode: PluginMode,
    webhook_mode: WebhookMode,
    node_resource: NodeResource,
    pod_resource: PodResource,
    correct_command: String,
    incorrect_command: String,
}

impl Scenario {
    /// Create a new builder for Scenario
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder::default()
    }

    /// Device plugin mode
    pub fn plugin_mode(&self) -> PluginMode {
        self.plugin_mode
    }

    /// Admission webhook mode
    pub fn webhook_mode(&self) -> WebhookMode {
        self.webhook_mode
    }

    /// Capacity the plugin advertises on nodes
    pub fn node_resource(&self) -> &NodeResource {
        &self.node_resource
    }

    /// Resource the workloads request
    pub fn pod_resource(&self) -> &PodResource {
        &self.pod_resource
    }

    /// Sub-test matching the programmed function
    pub fn correct_command(&self) -> &str {
        &self.correct_command
    }

    /// Sub-test of a sibling function
    pub fn incorrect_command(&self) -> &str {
        &self.incorrect_command
    }

    /// `<pluginMode>-<correct>-<incorrect>`, unique within a suite
    pub fn name(&self) -> String {
        format!(
            "{}-{}-{}",
            self.plugin_mode, self.correct_command, self.incorrect_command
        )
    }

    /// Name of the correct or incorrect workload
    pub fn workload_name(&self, correct: bool) -> String {
        format!(
            "{}-{}-{}",
            WORKLOAD_NAME_PREFIX,
            self.name(),
            if correct { "correct" } else { "incorrect" }
        )
    }

    /// Spec of the correct or incorrect workload
    pub fn workload(&self, correct: bool, image: &str) -> WorkloadSpec {
        let command = if correct {
            &self.correct_command
        } else {
            &self.incorrect_command
        };
        WorkloadSpec::new(
            self.workload_name(correct),
            self.pod_resource.clone(),
            image,
            command.as_str(),
        )
    }
}

/// Builder for Scenario
#[derive(Debug, Default)]
pub struct ScenarioBuilder {
    plugin_mode: Option<PluginMode>,
    webhook_mode: Option<WebhookMode>,
    node_resource: Option<NodeResource>,
    pod_resource: Option<PodResource>,
    correct_command: Option<String>,
    incorrect_command: Option<String>,
}

impl ScenarioBuilder {
    /// Set the device plugin mode
    pub fn plugin_mode(mut self, mode: PluginMode) -> Self {
        self.plugin_mode = Some(mode);
        self
    }

    /// Set the admission webhook mode
    pub fn webhook_mode(mut self, mode: WebhookMode) -> Self {
        self.webhook_mode = Some(mode);
        self
    }

    /// Set the node-scope capacity to wait for
    pub fn node_resource(mut self, resource: NodeResource) -> Self {
        self.node_resource = Some(resource);
        self
    }

    /// Set the pod-scope resource to request
    pub fn pod_resource(mut self, resource: PodResource) -> Self {
        self.pod_resource = Some(resource);
        self
    }

    /// Set the sub-test expected to succeed and the one expected to fail
    pub fn commands(mut self, correct: impl Into<String>, incorrect: impl Into<String>) -> Self {
        self.correct_command = Some(correct.into());
        self.incorrect_command = Some(incorrect.into());
        self
    }

    /// Validate and build the Scenario
    pub fn build(self) -> Result<Scenario> {
        let plugin_mode = self
            .plugin_mode
            .ok_or_else(|| Error::validation_for_field("pluginMode", "plugin mode is required"))?;
        let webhook_mode = self
            .webhook_mode
            .ok_or_else(|| Error::validation_for_field("webhookMode", "webhook mode is required"))?;
        let node_resource = self.node_resource.ok_or_else(|| {
            Error::validation_for_field("nodeResource", "node resource is required")
        })?;
        let pod_resource = self
            .pod_resource
            .ok_or_else(|| Error::validation_for_field("podResource", "pod resource is required"))?;
        let correct_command = self.correct_command.unwrap_or_default();
        let incorrect_command = self.incorrect_command.unwrap_or_default();

        if node_resource.kind().plugin_mode() != plugin_mode {
            return Err(Error::validation_for_field(
                "nodeResource",
                format!(
                    "{} is not advertised in {} mode",
                    node_resource, plugin_mode
                ),
            ));
        }

        if node_resource.domain() != pod_resource.domain() {
            return Err(Error::validation_for_field(
                "podResource",
                format!(
                    "{} and {} are in different resource domains",
                    pod_resource, node_resource
                ),
            ));
        }

        let paired = match plugin_mode {
            PluginMode::Region => WebhookMode::Orchestrated,
            PluginMode::Af => WebhookMode::Preprogrammed,
        };
        if webhook_mode != paired {
            return Err(Error::validation_for_field(
                "webhookMode",
                format!(
                    "plugin mode {} requires webhook mode {}, got {}",
                    plugin_mode, paired, webhook_mode
                ),
            ));
        }

        for (field, command) in [
            ("correctCommand", &correct_command),
            ("incorrectCommand", &incorrect_command),
        ] {
            if command.is_empty() || command.chars().any(char::is_whitespace) {
                return Err(Error::validation_for_field(
                    field,
                    format!("command {:?} must be a single non-empty word", command),
                ));
            }
        }
        if correct_command == incorrect_command {
            return Err(Error::validation_for_field(
                "incorrectCommand",
                format!(
                    "correct and incorrect commands are both {:?}",
                    correct_command
                ),
            ));
        }

        Ok(Scenario {
            plugin_mode,
            webhook_mode,
            node_resource,
            pod_resource,
            correct_command,
            incorrect_command,
        })
    }
}

/// Settings shared by every scenario of a run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioSettings {
    /// Resolved webhook deploy script
    pub webhook_script: PathBuf,
    /// Resolved device plugin deploy script
    pub plugin_script: PathBuf,
    /// `app` label of the webhook pods
    pub webhook_component: String,
    /// `app` label of the device plugin pods
    pub plugin_component: String,
    /// Workload container image
    pub image: String,
}

/// A completed step and how long it took
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepRecord {
    /// The step
    pub step: ScenarioStep,
    /// Time spent in it
    pub elapsed: Duration,
}

/// Steps a scenario completed, in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Scenario name
    pub scenario: String,
    /// Completed steps
    pub steps: Vec<StepRecord>,
}

impl ScenarioReport {
    fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            steps: Vec::new(),
        }
    }

    /// Whether every step of the sequence completed, in order
    pub fn is_complete(&self) -> bool {
        self.next_step() == ScenarioStep::Done
    }

    /// The state the scenario reached
    pub fn last_step(&self) -> Option<ScenarioStep> {
        if self.is_complete() {
            Some(ScenarioStep::Done)
        } else {
            self.steps.last().map(|r| r.step)
        }
    }

    /// Total time across all steps
    pub fn total_elapsed(&self) -> Duration {
        self.steps.iter().map(|r| r.elapsed).sum()
    }

    /// The step allowed to run next, `Done` once every step completed
    pub fn next_step(&self) -> ScenarioStep {
        match self.steps.last() {
            None => ScenarioStep::SEQUENCE[0],
            Some(r) => r.step.next().unwrap_or(ScenarioStep::Done),
        }
    }

    /// Run `fut` as `step`, refusing any step out of sequence.
    async fn step<T>(&mut self, step: ScenarioStep, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let expected = self.next_step();
        if step != expected || step == ScenarioStep::Done {
            return Err(Error::internal_with_context(
                "scenario",
                format!("step {step} is out of sequence, expected {expected}"),
            )
            .in_scenario(self.scenario.clone(), step));
        }

        let start = Instant::now();
        match fut.await {
            Ok(value) => {
                let elapsed = start.elapsed();
                info!(%step, ?elapsed, "step completed");
                self.steps.push(StepRecord { step, elapsed });
                Ok(value)
            }
            Err(e) => {
                error!(%step, error = %e, elapsed = ?start.elapsed(), "step failed");
                Err(e.in_scenario(self.scenario.clone(), step))
            }
        }
    }
}

/// Runs scenarios against one namespace
#[derive(Clone, Debug)]
pub struct ScenarioRunner {
    ctx: TestContext,
    settings: ScenarioSettings,
}

impl ScenarioRunner {
    /// Create a runner
    pub fn new(ctx: TestContext, settings: ScenarioSettings) -> Self {
        Self { ctx, settings }
    }

    /// The context scenarios run in
    pub fn context(&self) -> &TestContext {
        &self.ctx
    }

    /// Run every step of `scenario` in order, stopping at the first failure.
    pub async fn run(&self, scenario: &Scenario) -> Result<ScenarioReport> {
        let span = info_span!(
            "scenario",
            scenario = %scenario.name(),
            namespace = %self.ctx.namespace
        );
        self.run_steps(scenario).instrument(span).await
    }

    async fn run_steps(&self, scenario: &Scenario) -> Result<ScenarioReport> {
        let ctx = &self.ctx;
        let settings = &self.settings;
        let mut report = ScenarioReport::new(scenario.name());
        info!(
            plugin_mode = %scenario.plugin_mode,
            webhook_mode = %scenario.webhook_mode,
            node_resource = %scenario.node_resource,
            pod_resource = %scenario.pod_resource,
            "starting scenario"
        );

        report
            .step(
                ScenarioStep::DeployWebhook,
                ctx.deployer.deploy(
                    &settings.webhook_script,
                    scenario.webhook_mode.as_str(),
                    &ctx.namespace,
                ),
            )
            .await?;
        report
            .step(
                ScenarioStep::WaitWebhookReady,
                wait_ready(ctx, &settings.webhook_component, 1),
            )
            .await?;

        report
            .step(
                ScenarioStep::DeployAgent,
                ctx.deployer.deploy(
                    &settings.plugin_script,
                    scenario.plugin_mode.as_str(),
                    &ctx.namespace,
                ),
            )
            .await?;
        report
            .step(
                ScenarioStep::WaitAgentReady,
                wait_ready(ctx, &settings.plugin_component, 1),
            )
            .await?;

        report
            .step(
                ScenarioStep::WaitResourceAllocatable,
                wait_allocatable(ctx, &scenario.node_resource),
            )
            .await?;

        let correct = scenario.workload(true, &settings.image);
        let correct = report
            .step(ScenarioStep::SubmitCorrect, submit(ctx, &correct))
            .await?;
        report
            .step(ScenarioStep::VerifySuccess, expect_success(ctx, &correct))
            .await?;

        let incorrect = scenario.workload(false, &settings.image);
        let incorrect = report
            .step(ScenarioStep::SubmitIncorrect, submit(ctx, &incorrect))
            .await?;
        report
            .step(ScenarioStep::VerifyFailure, expect_failure(ctx, &incorrect))
            .await?;

        info!(elapsed = ?report.total_elapsed(), "scenario passed");
        Ok(report)
    }
}
