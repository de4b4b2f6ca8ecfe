//! Error types for the FPGA e2e harness
//!
//! Errors are structured with fields so a failed run can be traced back to
//! the cluster objects involved. Every wait failure carries the namespace,
//! the component or workload it was waiting on, and how long it waited.

use std::time::Duration;

use thiserror::Error;

use crate::scenario::ScenarioStep;

/// Main error type for harness operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Local I/O error (script lookup, process spawning)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid scenario or configuration, rejected before touching the cluster
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The offending field (e.g., "nodeResource")
        field: Option<String>,
    },

    /// External deployment procedure failed
    #[error("deploying {script} in {mode} mode to {namespace} failed: {message}")]
    Deployment {
        /// Path of the deploy script
        script: String,
        /// Mode passed to the script
        mode: String,
        /// Target namespace
        namespace: String,
        /// Exit code, if the process ran to completion
        exit_code: Option<i32>,
        /// Captured stderr or spawn error
        message: String,
    },

    /// Component pods never became running and ready
    #[error("{component} in {namespace}: fewer than {min_count} pod(s) running and ready after {elapsed:?}")]
    ReadinessTimeout {
        /// Component name (value of the `app` label)
        component: String,
        /// Namespace searched
        namespace: String,
        /// Number of ready pods required
        min_count: u32,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// Resource never became allocatable on any node
    #[error("resource {resource} not allocatable on any node after {elapsed:?}")]
    ResourceTimeout {
        /// Node-scope resource name
        resource: String,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// Workload rejected at creation
    #[error("creating workload {namespace}/{name} failed: {message}")]
    Submission {
        /// Workload name
        name: String,
        /// Namespace
        namespace: String,
        /// API error
        message: String,
    },

    /// Workload never reached the expected terminal phase
    #[error("workload {namespace}/{name} did not reach {expected} within {elapsed:?} (last phase: {last_phase})")]
    OutcomeTimeout {
        /// Workload name
        name: String,
        /// Namespace
        namespace: String,
        /// Expected terminal phase
        expected: String,
        /// Last phase observed before the timeout
        last_phase: String,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// Workload reached the opposite terminal phase
    #[error("workload {namespace}/{name} reached {actual}, expected {expected}")]
    UnexpectedOutcome {
        /// Workload name
        name: String,
        /// Namespace
        namespace: String,
        /// Expected terminal phase
        expected: String,
        /// Terminal phase actually reached
        actual: String,
    },

    /// A scenario aborted at a specific step
    #[error("scenario {scenario} failed at {step}: {source}")]
    ScenarioFailed {
        /// Scenario name
        scenario: String,
        /// Step that failed
        step: ScenarioStep,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// One or more scenarios of a suite failed
    #[error("{} scenario(s) failed: {}", .names.len(), .names.join(", "))]
    SuiteFailed {
        /// Names of the failed scenarios
        names: Vec<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Where the error occurred (e.g., "create_client")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error naming the offending field
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a deployment error
    pub fn deployment(
        script: impl Into<String>,
        mode: impl Into<String>,
        namespace: impl Into<String>,
        exit_code: Option<i32>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Deployment {
            script: script.into(),
            mode: mode.into(),
            namespace: namespace.into(),
            exit_code,
            message: msg.into(),
        }
    }

    /// Create a submission error
    pub fn submission(
        name: impl Into<String>,
        namespace: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Submission {
            name: name.into(),
            namespace: namespace.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Wrap an error with the scenario and step it aborted
    pub fn in_scenario(self, scenario: impl Into<String>, step: ScenarioStep) -> Self {
        Self::ScenarioFailed {
            scenario: scenario.into(),
            step,
            source: Box::new(self),
        }
    }

    /// Whether the error is a bounded wait running out of time
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::ReadinessTimeout { .. }
            | Error::ResourceTimeout { .. }
            | Error::OutcomeTimeout { .. } => true,
            Error::ScenarioFailed { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// The scenario step this error aborted, if it was raised by a scenario
    pub fn step(&self) -> Option<ScenarioStep> {
        match self {
            Error::ScenarioFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}
