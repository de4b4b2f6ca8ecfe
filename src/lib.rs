//! FPGA e2e - end-to-end validation of FPGA resource scheduling on Kubernetes
//!
//! Deploys the FPGA admission webhook and device plugin into a namespace,
//! waits for FPGA capacity to be advertised, then checks that a workload
//! requesting the programmed accelerator function runs while one running a
//! sibling function fails.
//!
//! # Modules
//!
//! - [`scenario`] - One end-to-end case and its strictly ordered steps
//! - [`suite`] - The region/af scenario set and its summary
//! - [`deploy`] - Deploy script invocation
//! - [`readiness`], [`resources`], [`outcome`] - Bounded waits on cluster state
//! - [`workload`] - Test pod construction and submission
//! - [`cluster`] - Cluster API seam ([`cluster::ClusterClient`])
//! - [`poll`] - The shared poll-until combinator
//! - [`resource_id`] - Node-scope and pod-scope FPGA resource names
//! - [`error`] - Error types for the harness

#![warn(missing_docs)]

pub mod cluster;
pub mod commands;
pub mod config;
pub mod context;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod outcome;
pub mod poll;
pub mod readiness;
pub mod resource_id;
pub mod resources;
pub mod scenario;
pub mod suite;
pub mod telemetry;
pub mod workload;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T, E = Error> = std::result::Result<T, E>;

use clap::{Parser, Subcommand};

use telemetry::LogFormat;

/// FPGA e2e - FPGA resource scheduling validation harness
#[derive(Parser, Debug)]
#[command(name = "fpga-e2e")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "FPGA_E2E_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the suite against the current cluster
    Run(commands::run::RunArgs),
    /// List the suite's scenarios
    List(commands::list::ListArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => commands::run::run(args).await,
            Commands::List(args) => commands::list::run(args),
        }
    }
}
