//! Verifying the terminal phase of a submitted workload
//!
//! The positive case requires `Succeeded`, the negative case requires
//! `Failed`. Reaching the opposite terminal phase ends the wait immediately:
//! terminal phases never transition, so polling on would only burn the
//! timeout. Either way the workload's logs and the namespace are dumped
//! before the error is returned.

use std::fmt;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::cluster::PodPhase;
use crate::context::TestContext;
use crate::diagnostics::{capture_workload, on_failure};
use crate::poll::wait_until;
use crate::workload::WorkloadHandle;
use crate::{Error, Result};

/// Terminal phase a workload is expected to reach
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpectedOutcome {
    /// Completed successfully
    Success,
    /// Failed or errored
    Failure,
}

impl ExpectedOutcome {
    /// Pod phase that satisfies the expectation
    pub fn phase(&self) -> PodPhase {
        match self {
            ExpectedOutcome::Success => PodPhase::Succeeded,
            ExpectedOutcome::Failure => PodPhase::Failed,
        }
    }
}

impl fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phase().as_str())
    }
}

/// Wait for the workload to complete successfully
pub async fn expect_success(ctx: &TestContext, handle: &WorkloadHandle) -> Result<()> {
    expect_outcome(ctx, handle, ExpectedOutcome::Success).await
}

/// Wait for the workload to fail
pub async fn expect_failure(ctx: &TestContext, handle: &WorkloadHandle) -> Result<()> {
    expect_outcome(ctx, handle, ExpectedOutcome::Failure).await
}

/// Wait for the workload to reach the `expected` terminal phase within the outcome timeout.
pub async fn expect_outcome(
    ctx: &TestContext,
    handle: &WorkloadHandle,
    expected: ExpectedOutcome,
) -> Result<()> {
    info!(
        namespace = %handle.namespace,
        workload = %handle.name,
        %expected,
        "waiting for workload outcome"
    );

    let client = ctx.client.as_ref();
    let namespace = handle.namespace.as_str();
    let name = handle.name.as_str();
    let last_phase: Mutex<Option<PodPhase>> = Mutex::new(None);
    let last = &last_phase;

    let wait = async {
        wait_until(
            &format!("{} {}", name, expected),
            ctx.poll_interval,
            ctx.timeouts.outcome,
            || async move {
                let phase = match client.pod_phase(namespace, name).await {
                    Ok(Some(phase)) => phase,
                    Ok(None) => {
                        debug!(workload = %name, "workload not found yet");
                        return Ok(None);
                    }
                    Err(e) => {
                        debug!(workload = %name, error = %e, "reading workload phase failed");
                        return Ok(None);
                    }
                };
                if let Ok(mut guard) = last.lock() {
                    *guard = Some(phase);
                }

                if phase == expected.phase() {
                    Ok(Some(()))
                } else if phase.is_terminal() {
                    Err(Error::UnexpectedOutcome {
                        name: name.to_string(),
                        namespace: namespace.to_string(),
                        expected: expected.to_string(),
                        actual: phase.to_string(),
                    })
                } else {
                    debug!(workload = %name, %phase, "workload not terminal yet");
                    Ok(None)
                }
            },
        )
        .await
        .map_err(|e| {
            e.or_timeout(|elapsed| Error::OutcomeTimeout {
                name: name.to_string(),
                namespace: namespace.to_string(),
                expected: expected.to_string(),
                last_phase: last
                    .lock()
                    .ok()
                    .and_then(|guard| *guard)
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "none observed".to_string()),
                elapsed,
            })
        })
    };

    on_failure(wait, ctx.timeouts.diagnostics, || capture_workload(ctx, name)).await?;
    info!(namespace = %handle.namespace, workload = %handle.name, %expected, "workload reached expected phase");
    Ok(())
}
