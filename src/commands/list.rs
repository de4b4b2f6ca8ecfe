//! `fpga-e2e list`: print the suite's scenarios

use std::io::Write;

use clap::Args;
use serde::Serialize;

use crate::scenario::Scenario;
use crate::suite::Suite;
use crate::Result;

/// Arguments for `list`
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Print JSON instead of one line per scenario
    #[arg(long)]
    pub json: bool,
}

/// Flattened view of a scenario for output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioSummary {
    name: String,
    plugin_mode: String,
    webhook_mode: String,
    node_resource: String,
    pod_resource: String,
    correct_command: String,
    incorrect_command: String,
}

impl From<&Scenario> for ScenarioSummary {
    fn from(s: &Scenario) -> Self {
        Self {
            name: s.name(),
            plugin_mode: s.plugin_mode().to_string(),
            webhook_mode: s.webhook_mode().to_string(),
            node_resource: s.node_resource().to_string(),
            pod_resource: s.pod_resource().to_string(),
            correct_command: s.correct_command().to_string(),
            incorrect_command: s.incorrect_command().to_string(),
        }
    }
}

/// Print the scenarios in execution order
pub fn run(args: ListArgs) -> Result<()> {
    let suite = Suite::fpga_plugin()?;
    let mut out = std::io::stdout().lock();
    write_scenarios(&mut out, suite.scenarios(), args.json)
}

fn write_scenarios(out: &mut impl Write, scenarios: &[Scenario], json: bool) -> Result<()> {
    if json {
        let summaries: Vec<ScenarioSummary> = scenarios.iter().map(ScenarioSummary::from).collect();
        let text = serde_json::to_string_pretty(&summaries).map_err(|e| {
            crate::Error::internal_with_context("list", format!("failed to serialize scenarios: {}", e))
        })?;
        writeln!(out, "{}", text)?;
        return Ok(());
    }

    for s in scenarios {
        writeln!(
            out,
            "{:20} plugin={:<6} webhook={:<13} node={} pod={}",
            s.name(),
            s.plugin_mode(),
            s.webhook_mode(),
            s.node_resource(),
            s.pod_resource()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(json: bool) -> String {
        let suite = Suite::fpga_plugin().unwrap();
        let mut out = Vec::new();
        write_scenarios(&mut out, suite.scenarios(), json).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn lists_every_scenario_in_order() {
        let text = render(false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("region-nlb3-nlb0"));
        assert!(lines[0].contains("webhook=orchestrated"));
        assert!(lines[2].starts_with("af-nlb0-nlb3"));
        assert!(lines[2].contains("pod=fpga.intel.com/arria10.dcp1.2-nlb0"));
    }

    #[test]
    fn json_output_uses_camel_case_fields() {
        let value: serde_json::Value = serde_json::from_str(&render(true)).unwrap();
        let scenarios = value.as_array().unwrap();
        assert_eq!(scenarios.len(), 3);
        assert_eq!(scenarios[1]["name"], "region-nlb0-nlb3");
        assert_eq!(scenarios[1]["podResource"], "fpga.intel.com/arria10.dcp1.2-nlb0");
        assert_eq!(scenarios[2]["webhookMode"], "preprogrammed");
        assert_eq!(scenarios[2]["incorrectCommand"], "nlb3");
    }
}
