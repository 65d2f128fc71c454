//! Run reports.

use std::path::{Path, PathBuf};

use tokio::fs;
use veri_protocol::{RunSummary, ScenarioResult, ScenarioStatus};

use crate::error::{HarnessError, Result};

/// File name of the summary written into the output directory.
pub const SUMMARY_FILE: &str = "summary.json";

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
	summary: RunSummary,
}

impl RunReport {
	pub fn new(scenarios: Vec<ScenarioResult>, fatal: Option<String>, duration_ms: u64) -> Self {
		Self {
			summary: RunSummary::from_results(scenarios, fatal, duration_ms),
		}
	}

	pub fn summary(&self) -> &RunSummary {
		&self.summary
	}

	pub fn into_summary(self) -> RunSummary {
		self.summary
	}

	pub fn is_fatal(&self) -> bool {
		self.summary.fatal.is_some()
	}

	/// 0 when everything passed, 2 after a run-fatal error, 1 otherwise.
	pub fn exit_code(&self) -> i32 {
		if self.is_fatal() {
			2
		} else if self.summary.all_passed() {
			0
		} else {
			1
		}
	}

	/// Scenarios that did not pass, in run order.
	pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
		self.summary
			.scenarios
			.iter()
			.filter(|s| s.status != ScenarioStatus::Passed)
	}

	/// Every artifact path written during the run.
	pub fn manifest(&self) -> Vec<PathBuf> {
		self.summary
			.artifact_index
			.iter()
			.flat_map(|entry| entry.paths.iter().cloned())
			.collect()
	}

	/// Writes `summary.json` into `dir`, creating it if needed.
	pub async fn write_summary(&self, dir: &Path) -> Result<PathBuf> {
		fs::create_dir_all(dir).await.map_err(|e| HarnessError::io(dir, e))?;
		let path = dir.join(SUMMARY_FILE);
		let json = serde_json::to_vec_pretty(&self.summary)
			.map_err(|e| HarnessError::io(&path, std::io::Error::other(e)))?;
		fs::write(&path, json).await.map_err(|e| HarnessError::io(&path, e))?;
		Ok(path)
	}
}

#[cfg(test)]
mod tests {
	use veri_protocol::{Artifact, ArtifactKind, ErrorCode, StepOutcome, StepResult};

	use super::*;

	fn passed(name: &str) -> ScenarioResult {
		ScenarioResult {
			name: name.into(),
			status: ScenarioStatus::Passed,
			steps: vec![StepResult {
				index: 0,
				action: "navigate".into(),
				label: None,
				locator_used: None,
				outcome: StepOutcome::Success,
				duration_ms: 12,
				produced: Vec::new(),
			}],
			reason: None,
			duration_ms: 12,
		}
	}

	fn failed(name: &str) -> ScenarioResult {
		ScenarioResult {
			name: name.into(),
			status: ScenarioStatus::Failed,
			steps: vec![StepResult {
				index: 0,
				action: "click".into(),
				label: None,
				locator_used: None,
				outcome: StepOutcome::Failure {
					reason: "no element matches".into(),
					error_code: ErrorCode::SelectorNotFound,
					artifacts: vec![Artifact::new(
						ArtifactKind::Screenshot,
						format!("out/{name}/step-00-click-failure.png"),
						Some(10),
					)],
				},
				duration_ms: 5000,
				produced: Vec::new(),
			}],
			reason: Some("step 0 (click): no element matches".into()),
			duration_ms: 5000,
		}
	}

	#[test]
	fn exit_codes() {
		assert_eq!(RunReport::new(vec![passed("a"), passed("b")], None, 1).exit_code(), 0);
		assert_eq!(RunReport::new(vec![passed("a"), failed("b")], None, 1).exit_code(), 1);
		assert_eq!(RunReport::new(vec![passed("a")], Some("browser gone".into()), 1).exit_code(), 2);
		assert_eq!(RunReport::new(Vec::new(), None, 0).exit_code(), 0);
	}

	#[test]
	fn manifest_lists_failure_artifacts() {
		let report = RunReport::new(vec![passed("a"), failed("b")], None, 1);
		assert_eq!(report.manifest(), vec![PathBuf::from("out/b/step-00-click-failure.png")]);
		assert_eq!(report.failures().map(|s| s.name.as_str()).collect::<Vec<_>>(), ["b"]);
	}

	#[tokio::test]
	async fn summary_file_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let report = RunReport::new(vec![failed("settings-dialog")], None, 7);
		let path = report.write_summary(&dir.path().join("out")).await.unwrap();
		assert!(path.ends_with("out/summary.json"));

		let written: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
		assert_eq!(written["schemaVersion"], 1);
		assert_eq!(written["failed"], 1);
		assert_eq!(written["scenarios"][0]["steps"][0]["errorCode"], "SELECTOR_NOT_FOUND");
	}

	#[tokio::test]
	async fn summary_over_a_file_is_an_io_error() {
		let dir = tempfile::tempdir().unwrap();
		let blocker = dir.path().join("out");
		std::fs::write(&blocker, "not a directory").unwrap();

		let report = RunReport::new(vec![passed("a")], None, 1);
		let err = report.write_summary(&blocker).await.unwrap_err();
		assert!(matches!(&err, HarnessError::Io { path, .. } if path == &blocker), "{err}");
	}
}
