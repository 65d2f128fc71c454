use serde::Serialize;
use tracing::info;
use veri::load;

use crate::cli::CheckArgs;
use crate::error::Result;
use crate::output::{self, OutputFormat, ResultBuilder};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedScenario {
	pub name: String,
	pub steps: usize,
}

/// Loads and validates every file; the first invalid one fails the command.
pub fn validate(args: &CheckArgs) -> Result<Vec<CheckedScenario>> {
	let scenarios = load::load_all(&args.files)?;
	info!(target = "veri", count = scenarios.len(), "scenarios valid");
	Ok(scenarios
		.iter()
		.map(|s| CheckedScenario {
			name: s.name.clone(),
			steps: s.steps.len(),
		})
		.collect())
}

pub fn execute(args: &CheckArgs, format: OutputFormat) -> Result<i32> {
	let checked = validate(args)?;

	if format == OutputFormat::Text {
		for scenario in &checked {
			println!("ok  {} ({} steps)", scenario.name, scenario.steps);
		}
		return Ok(0);
	}

	let result = ResultBuilder::new("check").data(checked).build();
	output::print_result(&result, format);
	Ok(0)
}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::TempDir;

	use super::*;
	use crate::error::VeriError;

	#[test]
	fn reports_every_scenario() {
		let temp = TempDir::new().unwrap();
		fs::write(
			temp.path().join("a.yaml"),
			"- name: first\n  steps:\n    - action: navigate\n      url: /\n- name: second\n  steps:\n    - action: navigate\n      url: /\n    - action: screenshot\n      path: home.png\n",
		)
		.unwrap();

		let checked = validate(&CheckArgs {
			files: vec![temp.path().to_path_buf()],
		})
		.unwrap();
		assert_eq!(checked.len(), 2);
		assert_eq!(checked[1].name, "second");
		assert_eq!(checked[1].steps, 2);
	}

	#[test]
	fn empty_scenario_fails() {
		let temp = TempDir::new().unwrap();
		let file = temp.path().join("empty.yaml");
		fs::write(&file, "name: empty\nsteps: []\n").unwrap();

		let err = validate(&CheckArgs { files: vec![file] }).unwrap_err();
		assert!(matches!(err, VeriError::Harness(_)));
		assert!(err.to_string().contains("has no steps"));
	}
}
