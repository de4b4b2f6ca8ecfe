//! FPGA e2e CLI
//!
//! Runs the FPGA plugin scheduling suite against the current cluster.

use clap::Parser;

use fpga_e2e::telemetry::init_logging;
use fpga_e2e::{Cli, Error, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)
        .map_err(|e| Error::internal_with_context("init_logging", e.to_string()))?;

    cli.run().await
}
